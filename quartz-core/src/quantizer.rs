// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `quantizer` module implements rate-distortion-optimal scalar
//! quantizer design.
//!
//! A quantizer is a deterministic map from an input alphabet onto a smaller
//! output alphabet. [`design`] finds, for a given PMF and distortion table,
//! the map with exactly `states` output symbols that minimizes the expected
//! distortion, subject to the classical scalar constraints: the partition of
//! the (sorted) input alphabet into regions is contiguous, and each region
//! reproduces as a single representative inside it. Restricting the
//! representative to its own region keeps representatives strictly
//! increasing, so the output alphabet always has exactly `states` symbols.

use crate::alphabet::{Alphabet, Symbol};
use crate::distortion::DistortionTable;
use crate::pmf::Pmf;

/// A deterministic scalar quantizer.
#[derive(Clone, Debug)]
pub struct Quantizer {
    input: Alphabet,
    output: Alphabet,
    map: Vec<Symbol>,
    /// The probability that the runtime selector picks this quantizer out of
    /// its low/high pair.
    pub ratio: f64,
}

impl Quantizer {
    /// Builds a quantizer directly from its reproduction map. The output
    /// alphabet is recovered as the ordered distinct reproduction values.
    pub fn from_map(input: &Alphabet, map: Vec<Symbol>, ratio: f64) -> Self {
        assert_eq!(map.len(), input.len());
        let output = Alphabet::from_symbols(&map);
        Quantizer { input: input.clone(), output, map, ratio }
    }

    /// The input alphabet.
    pub fn input_alphabet(&self) -> &Alphabet {
        &self.input
    }

    /// The output alphabet: the ordered set of reproduction symbols.
    pub fn output_alphabet(&self) -> &Alphabet {
        &self.output
    }

    /// The number of output states.
    pub fn states(&self) -> usize {
        self.output.len()
    }

    /// The reproduction symbol for the given input symbol.
    ///
    /// Panics if the symbol is not in the input alphabet.
    pub fn map(&self, sym: Symbol) -> Symbol {
        let index = self.input.index_of(sym).expect("symbol outside quantizer input alphabet");
        self.map[index]
    }

    /// The reproduction symbol for the input symbol at the given index of
    /// the input alphabet.
    pub fn map_at(&self, index: usize) -> Symbol {
        self.map[index]
    }

    /// The compact code index of a reproduction symbol, i.e. its position in
    /// the output alphabet.
    pub fn code_index(&self, reproduction: Symbol) -> Option<usize> {
        self.output.index_of(reproduction)
    }

    /// The raw reproduction map, indexed by input-alphabet position.
    pub fn raw_map(&self) -> &[Symbol] {
        &self.map
    }
}

// Equality deliberately ignores `ratio`: the file format persists ratios
// per column, not per quantizer, so a reloaded family carries quantized
// ratios while a freshly generated one carries raw ones.
impl PartialEq for Quantizer {
    fn eq(&self, other: &Self) -> bool {
        self.input == other.input && self.map == other.map
    }
}

/// Designs the `states`-level quantizer minimizing expected distortion under
/// `pmf`, and returns it together with that minimal expected distortion.
///
/// `ratio` is stored on the returned quantizer for the runtime selector.
/// `states >= |A_in|` degenerates to the identity map. `states` must be at
/// least 1; the state allocator can never produce 0.
pub fn design(
    pmf: &Pmf,
    dist: &DistortionTable,
    states: usize,
    ratio: f64,
) -> (Quantizer, f64) {
    assert!(states >= 1, "quantizer must have at least one state");

    let input = pmf.alphabet();
    let n = input.len();

    if states >= n {
        let map: Vec<Symbol> = input.iter().collect();
        return (Quantizer::from_map(input, map, ratio), 0.0);
    }

    let syms: Vec<Symbol> = input.iter().collect();
    let probs: Vec<f64> = (0..n).map(|i| pmf.prob_at(i)).collect();

    // Prefix sums of p(x) * D[x, c] per candidate representative c, so any
    // contiguous region cost is two lookups.
    let mut prefix = vec![vec![0.0; n + 1]; n];
    for c in 0..n {
        for i in 0..n {
            prefix[c][i + 1] = prefix[c][i] + probs[i] * dist.cost(syms[i], syms[c]);
        }
    }
    let region = |first: usize, last: usize, c: usize| prefix[c][last + 1] - prefix[c][first];

    // Best in-region representative for every contiguous region, ties to
    // the smallest symbol so the design is fully deterministic.
    let mut region_cost = vec![vec![0.0; n]; n];
    let mut region_rep = vec![vec![0usize; n]; n];
    for first in 0..n {
        for last in first..n {
            let mut best = f64::INFINITY;
            let mut rep = first;
            for c in first..=last {
                let cost = region(first, last, c);
                if cost < best {
                    best = cost;
                    rep = c;
                }
            }
            region_cost[first][last] = best;
            region_rep[first][last] = rep;
        }
    }

    // dp[k][j]: minimal cost of splitting symbols 0..=j into k regions.
    let mut dp = vec![vec![f64::INFINITY; n]; states + 1];
    let mut split = vec![vec![0usize; n]; states + 1];
    for j in 0..n {
        dp[1][j] = region_cost[0][j];
    }
    for k in 2..=states {
        for j in (k - 1)..n {
            let mut best = f64::INFINITY;
            let mut at = k - 1;
            for first in (k - 1)..=j {
                let cost = dp[k - 1][first - 1] + region_cost[first][j];
                if cost < best {
                    best = cost;
                    at = first;
                }
            }
            dp[k][j] = best;
            split[k][j] = at;
        }
    }

    let mut map = vec![0; n];
    let mut last = n - 1;
    for k in (1..=states).rev() {
        let first = if k == 1 { 0 } else { split[k][last] };
        let rep = syms[region_rep[first][last]];
        for slot in map.iter_mut().take(last + 1).skip(first) {
            *slot = rep;
        }
        if first > 0 {
            last = first - 1;
        }
    }

    let mse = dp[states][n - 1];
    (Quantizer::from_map(input, map, ratio), mse)
}

#[cfg(test)]
mod tests {
    use super::design;
    use crate::alphabet::Alphabet;
    use crate::distortion::{DistortionMetric, DistortionTable};
    use crate::pmf::Pmf;

    fn ready_pmf(alphabet: &Alphabet, weights: &[f64]) -> Pmf {
        let mut pmf = Pmf::from_weights(alphabet, weights.to_vec());
        pmf.renormalize();
        pmf
    }

    #[test]
    fn verify_identity_when_states_cover_alphabet() {
        let a = Alphabet::contiguous(6);
        let pmf = ready_pmf(&a, &[1.0; 6]);
        let dist = DistortionTable::build(6, DistortionMetric::Mse);

        for states in [6, 9] {
            let (q, mse) = design(&pmf, &dist, states, 1.0);
            assert_eq!(mse, 0.0);
            assert_eq!(q.states(), 6);
            for sym in a.iter() {
                assert_eq!(q.map(sym), sym);
            }
        }
    }

    #[test]
    fn verify_single_state_picks_weighted_optimum() {
        let a = Alphabet::contiguous(10);
        let mut weights = [0.0; 10];
        weights[6] = 1.0;
        let pmf = ready_pmf(&a, &weights);
        let dist = DistortionTable::build(10, DistortionMetric::Mse);

        let (q, mse) = design(&pmf, &dist, 1, 1.0);
        assert_eq!(q.states(), 1);
        assert_eq!(mse, 0.0);
        for sym in a.iter() {
            assert_eq!(q.map(sym), 6);
        }
    }

    #[test]
    fn verify_map_lands_in_output_alphabet() {
        let a = Alphabet::contiguous(8);
        let pmf = ready_pmf(&a, &[0.3, 0.05, 0.05, 0.2, 0.1, 0.1, 0.05, 0.15]);
        let dist = DistortionTable::build(8, DistortionMetric::Mse);

        for states in 1..=8 {
            let (q, mse) = design(&pmf, &dist, states, 0.5);
            assert_eq!(q.states(), states);
            let mut recomputed = 0.0;
            for (i, sym) in a.iter().enumerate() {
                let rep = q.map(sym);
                assert!(q.output_alphabet().contains(rep));
                recomputed += pmf.prob_at(i) * dist.cost(sym, rep);
            }
            assert!((recomputed - mse).abs() < 1e-9);
        }
    }

    // Exhaustively enumerates contiguous partitions to confirm the dynamic
    // program is optimal on a small alphabet.
    #[test]
    fn verify_optimal_against_exhaustive_search() {
        let a = Alphabet::contiguous(6);
        let weights = [0.35, 0.02, 0.13, 0.2, 0.05, 0.25];
        let pmf = ready_pmf(&a, &weights);
        let dist = DistortionTable::build(6, DistortionMetric::Mse);

        fn exhaustive(
            weights: &[f64],
            dist: &DistortionTable,
            first: usize,
            states: usize,
        ) -> f64 {
            let n = weights.len();
            let region = |lo: usize, hi: usize| -> f64 {
                (lo..=hi)
                    .map(|c| {
                        (lo..=hi)
                            .map(|x| weights[x] * dist.cost(x as u8, c as u8))
                            .sum::<f64>()
                    })
                    .fold(f64::INFINITY, f64::min)
            };
            if states == 1 {
                return region(first, n - 1);
            }
            let mut best = f64::INFINITY;
            for last in first..=(n - states) {
                let cost = region(first, last) + exhaustive(weights, dist, last + 1, states - 1);
                if cost < best {
                    best = cost;
                }
            }
            best
        }

        let total: f64 = weights.iter().sum();
        let norm: Vec<f64> = weights.iter().map(|w| w / total).collect();
        for states in 1..=5 {
            let (_, mse) = design(&pmf, &dist, states, 1.0);
            let best = exhaustive(&norm, &dist, 0, states);
            assert!((mse - best).abs() < 1e-9, "states {}: {} vs {}", states, mse, best);
        }
    }

    // The weighted mean (squared error) and weighted median (absolute error)
    // of a two-spike distribution disagree, so the metrics must choose
    // different representatives while keeping the same state count.
    #[test]
    fn verify_metric_changes_representative_not_size() {
        let a = Alphabet::contiguous(5);
        let pmf = ready_pmf(&a, &[0.55, 0.0, 0.0, 0.0, 0.45]);

        let mse = DistortionTable::build(5, DistortionMetric::Mse);
        let manhattan = DistortionTable::build(5, DistortionMetric::Manhattan);

        let (q_mse, _) = design(&pmf, &mse, 1, 1.0);
        let (q_l1, _) = design(&pmf, &manhattan, 1, 1.0);

        assert_eq!(q_mse.states(), q_l1.states());
        assert_eq!(q_mse.map(0), 2);
        assert_eq!(q_l1.map(0), 0);
    }
}
