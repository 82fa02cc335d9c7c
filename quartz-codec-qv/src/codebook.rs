// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `codebook` module builds and serves the conditional quantizer family.
//!
//! The family holds, for every column, one (low, high) quantizer pair per
//! possible *quantized* left-context symbol, plus the mixing ratio that
//! decides between the pair at runtime. [`generate_codebooks`] performs the
//! column-by-column construction; [`ConditionalQuantizerFamily::select`] is
//! the runtime lookup shared by encoder and decoder.

use log::debug;

use quartz_core::alphabet::{Alphabet, Symbol};
use quartz_core::distortion::DistortionTable;
use quartz_core::errors::{invalid_config_error, malformed_codebook_error, Result};
use quartz_core::pmf::Pmf;
use quartz_core::quantizer::{design, Quantizer};
use quartz_core::rng::Well1024a;

use crate::stats::ConditionalPmfStore;

/// Converts a target entropy (bits) into low/high state counts and the
/// probability of choosing the low count.
///
/// With `r = ratio`, `r * log2(lo) + (1 - r) * log2(hi)` equals the target,
/// so stochastically mixing the two integer-sized quantizers realizes the
/// fractional bit budget in expectation. A non-positive target (including
/// the degenerate-PMF case) yields a single state.
pub fn find_states(entropy: f64) -> (usize, usize, f64) {
    if entropy <= 0.0 {
        return (1, 1, 1.0);
    }

    let spread = 2f64.powf(entropy);
    let lo = (spread.floor() as usize).max(1);
    let hi = (spread.ceil() as usize).max(1);
    if lo == hi {
        return (lo, hi, 1.0);
    }

    let h_lo = (lo as f64).log2();
    let h_hi = (hi as f64).log2();
    let ratio = ((entropy - h_hi) / (h_lo - h_hi)).clamp(0.0, 1.0);
    (lo, hi, ratio)
}

/// A low/high quantizer pair with its raw mixing ratio.
#[derive(Debug)]
pub struct QuantizerPair {
    pub lo: Quantizer,
    pub hi: Quantizer,
    /// Probability of selecting `lo`. This raw value drives codebook
    /// generation only; runtime selection uses the persisted per-column
    /// percent (see [`ConditionalQuantizerFamily::select`]).
    pub ratio: f64,
}

impl PartialEq for QuantizerPair {
    fn eq(&self, other: &Self) -> bool {
        self.lo == other.lo && self.hi == other.hi
    }
}

/// Which leg of a pair the selector picked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Leg {
    Lo,
    Hi,
}

/// The outcome of one runtime selection.
pub struct Selection<'a> {
    pub quantizer: &'a Quantizer,
    pub leg: Leg,
    pub context_index: usize,
}

/// The full (column x context) table of quantizer pairs, the per-column
/// context alphabets, and the runtime selection state.
///
/// The family owns everything it refers to; the PMFs used to build it are
/// scoped to [`generate_codebooks`] and dropped there.
pub struct ConditionalQuantizerFamily {
    columns: usize,
    alphabet: Alphabet,
    contexts: Vec<Alphabet>,
    pairs: Vec<Vec<QuantizerPair>>,
    /// Per-column selection ratio in integer percent. This is the form the
    /// file format persists (context 0 only), so both sides select with it.
    select_ratios: Vec<u8>,
    seed: u32,
    well: Well1024a,
}

impl ConditionalQuantizerFamily {
    /// Creates an empty family; columns are appended during construction.
    pub fn new(alphabet: &Alphabet, seed: u32) -> Self {
        ConditionalQuantizerFamily {
            columns: 0,
            alphabet: alphabet.clone(),
            contexts: Vec::new(),
            pairs: Vec::new(),
            select_ratios: Vec::new(),
            seed,
            well: Well1024a::new(seed),
        }
    }

    /// Appends one column of quantizer pairs, indexed by the given context
    /// alphabet, with the persisted selection ratio in percent.
    pub fn push_column(
        &mut self,
        contexts: Alphabet,
        pairs: Vec<QuantizerPair>,
        select_ratio: u8,
    ) {
        assert_eq!(contexts.len(), pairs.len());
        assert!(select_ratio <= 100);
        self.contexts.push(contexts);
        self.pairs.push(pairs);
        self.select_ratios.push(select_ratio);
        self.columns += 1;
    }

    /// The number of columns.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// The full input alphabet.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The PRNG seed the selection stream is derived from.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// The context alphabet of the given column: every symbol the previous
    /// column's quantizers can produce.
    pub fn context_alphabet(&self, column: usize) -> &Alphabet {
        &self.contexts[column]
    }

    /// The quantizer pair at the given column and context index.
    pub fn pair_at(&self, column: usize, context_index: usize) -> &QuantizerPair {
        &self.pairs[column][context_index]
    }

    /// All quantizer pairs of a column, in context-alphabet order.
    pub fn pairs_at(&self, column: usize) -> &[QuantizerPair] {
        &self.pairs[column]
    }

    /// The quantizer pair for the given column and left-context symbol, or
    /// `None` if that symbol cannot occur there.
    pub fn pair_by_symbol(&self, column: usize, prev: Symbol) -> Option<&QuantizerPair> {
        let index = self.contexts[column].index_of(prev)?;
        Some(&self.pairs[column][index])
    }

    /// The persisted selection ratio of the given column, in percent.
    pub fn select_ratio(&self, column: usize) -> u8 {
        self.select_ratios[column]
    }

    /// Re-seeds the selection PRNG. Encode and decode each start from a
    /// freshly seeded generator so their selection streams coincide.
    pub fn reset_rng(&mut self) {
        self.well = Well1024a::new(self.seed);
    }

    /// Selects the low or high quantizer for one symbol of the given column,
    /// following the previous *quantized* symbol.
    ///
    /// Consumes exactly one PRNG draw. The comparison uses the persisted
    /// per-column percent ratio: the file format keeps only the context-0
    /// ratio, so selecting with the raw per-context ratios on the encode
    /// side would desynchronize the decoder.
    pub fn select(&mut self, column: usize, prev: Symbol) -> Result<Selection<'_>> {
        let context_index = match self.contexts[column].index_of(prev) {
            Some(index) => index,
            None => return malformed_codebook_error("no quantizer for the previous symbol"),
        };

        let ratio = f64::from(self.select_ratios[column]) / 100.0;
        let pair = &self.pairs[column][context_index];
        let selection = if self.well.next_unit() < ratio {
            Selection { quantizer: &pair.lo, leg: Leg::Lo, context_index }
        }
        else {
            Selection { quantizer: &pair.hi, leg: Leg::Hi, context_index }
        };
        Ok(selection)
    }
}

impl PartialEq for ConditionalQuantizerFamily {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.alphabet == other.alphabet
            && self.contexts == other.contexts
            && self.pairs == other.pairs
            && self.select_ratios == other.select_ratios
    }
}

pub(crate) fn output_union(pairs: &[QuantizerPair]) -> Alphabet {
    let mut union = pairs[0].lo.output_alphabet().clone();
    for pair in pairs.iter() {
        union = Alphabet::union(&union, pair.lo.output_alphabet());
        union = Alphabet::union(&union, pair.hi.output_alphabet());
    }
    union
}

fn normalize_in_place(weights: &mut [f64]) {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in weights.iter_mut() {
            *w /= total;
        }
    }
}

fn percent(ratio: f64) -> u8 {
    (ratio * 100.0).floor() as u8
}

fn union_index(union: &Alphabet, sym: Symbol) -> usize {
    union.index_of(sym).expect("quantizer output missing from the context union")
}

/// Builds the conditional quantizer family for the given training
/// statistics, distortion table, and compression fraction, and returns it
/// together with the expected per-symbol distortion of the design.
///
/// `comp` scales each conditional entropy before state allocation; 0 forces
/// every quantizer down to one state, 1 targets the full conditional
/// entropy of the training data.
pub fn generate_codebooks(
    stats: &ConditionalPmfStore,
    dist: &DistortionTable,
    comp: f64,
    seed: u32,
) -> Result<(ConditionalQuantizerFamily, f64)> {
    if !(0.0..=1.0).contains(&comp) {
        return invalid_config_error("compression fraction must lie in [0, 1]");
    }
    if dist.size() != stats.alphabet().len() {
        return invalid_config_error("distortion table does not cover the alphabet");
    }

    let alphabet = stats.alphabet().clone();
    let size = alphabet.len();
    let columns = stats.columns();

    let mut family = ConditionalQuantizerFamily::new(&alphabet, seed);
    let mut expected_distortion = 0.0;

    // Column 0 has a single dummy context.
    let pmf0 = stats.cond(0, 0);
    let (lo, hi, ratio) = find_states(pmf0.entropy() * comp);
    let (q_lo, mse_lo) = design(pmf0, dist, lo, ratio);
    let (q_hi, mse_hi) = design(pmf0, dist, hi, 1.0 - ratio);
    expected_distortion += ratio * mse_lo + (1.0 - ratio) * mse_hi;

    debug!("column 0: {} / {} states, ratio {:.3}", lo, hi, ratio);
    family.push_column(
        Alphabet::singleton(0),
        vec![QuantizerPair { lo: q_lo, hi: q_hi, ratio }],
        percent(ratio),
    );

    // ctx_posterior[v][w]: probability that the previous column quantized to
    // its w-th context value, given that the current raw symbol is v. For
    // column 1 the previous column has the single dummy context.
    let mut ctx_posterior: Vec<Vec<f64>> = vec![vec![1.0]; size];

    for column in 1..columns {
        let prev_pairs = &family.pairs[column - 1];
        let union = output_union(prev_pairs);

        // qpmf[v](u): probability that the previous column quantized to u,
        // given that its raw symbol was v. Mixes each stored pair with its
        // raw ratio, weighted by how likely that pair was in play.
        let mut qpmf = vec![vec![0.0; union.len()]; size];
        for v in 0..size {
            for (w, pair) in prev_pairs.iter().enumerate() {
                let weight = ctx_posterior[v][w];
                if weight == 0.0 {
                    continue;
                }
                let lo_rep = union_index(&union, pair.lo.map_at(v));
                let hi_rep = union_index(&union, pair.hi.map_at(v));
                qpmf[v][lo_rep] += weight * pair.ratio;
                qpmf[v][hi_rep] += weight * (1.0 - pair.ratio);
            }
            normalize_in_place(&mut qpmf[v]);
        }

        // Context prior P(Q_{j-1} = u) under the training marginal.
        let marginal_prev = stats.marginal(column - 1);
        let mut prior = vec![0.0; union.len()];
        for v in 0..size {
            let mass = marginal_prev.prob_at(v);
            if mass == 0.0 {
                continue;
            }
            for (u, p) in qpmf[v].iter().enumerate() {
                prior[u] += mass * p;
            }
        }
        normalize_in_place(&mut prior);

        // xpmf[u]: the distribution of this column's raw symbol given that
        // the previous column quantized to u. This is the distribution each
        // quantizer will actually face at encode time.
        let mut xpmfs = Vec::with_capacity(union.len());
        for u in 0..union.len() {
            let mut weights = vec![0.0; size];
            for v in 0..size {
                let mass = marginal_prev.prob_at(v) * qpmf[v][u];
                if mass == 0.0 {
                    continue;
                }
                let cond = stats.cond(column, alphabet.at(v));
                for (x, w) in weights.iter_mut().enumerate() {
                    *w += mass * cond.prob_at(x);
                }
            }
            let mut xpmf = Pmf::from_weights(&alphabet, weights);
            xpmf.renormalize();
            xpmfs.push(xpmf);
        }

        let mut pairs = Vec::with_capacity(union.len());
        for (u, xpmf) in xpmfs.iter().enumerate() {
            let (lo, hi, ratio) = find_states(xpmf.entropy() * comp);
            let (q_lo, mse_lo) = design(xpmf, dist, lo, ratio);
            let (q_hi, mse_hi) = design(xpmf, dist, hi, 1.0 - ratio);
            expected_distortion += prior[u] * (ratio * mse_lo + (1.0 - ratio) * mse_hi);
            pairs.push(QuantizerPair { lo: q_lo, hi: q_hi, ratio });
        }

        debug!(
            "column {}: {} contexts, mean target {:.3} bits",
            column,
            union.len(),
            xpmfs.iter().map(|p| p.entropy() * comp).sum::<f64>() / union.len() as f64
        );

        // Posterior of the just-designed column's quantized value given its
        // raw symbol, for the next iteration's qpmf.
        if column + 1 < columns {
            let mut next_posterior = vec![vec![0.0; union.len()]; size];
            for (x, posterior) in next_posterior.iter_mut().enumerate() {
                for u in 0..union.len() {
                    posterior[u] = xpmfs[u].prob_at(x) * prior[u];
                }
                normalize_in_place(posterior);
            }
            ctx_posterior = next_posterior;
        }

        let ratio0 = percent(pairs[0].ratio);
        family.push_column(union, pairs, ratio0);
    }

    Ok((family, expected_distortion / columns as f64))
}
