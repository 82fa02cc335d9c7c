// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `stats` module gathers the training statistics the codebook
//! generator consumes: the column-0 PMF, one conditional PMF per
//! (column, previous symbol) pair, and the forward-propagated per-column
//! marginals.

use quartz_core::alphabet::{Alphabet, Symbol};
use quartz_core::errors::{degenerate_column_error, empty_training_error, Result};
use quartz_core::pmf::Pmf;

/// Training statistics for a fixed-width symbol stream.
///
/// The conditional PMFs live in one flat block. The layout is load-bearing:
/// `pmfs[0]` is P(X0); the PMF of column `j > 0` conditioned on the previous
/// symbol `v` is `pmfs[1 + (j - 1) * |A| + v]`.
pub struct ConditionalPmfStore {
    columns: usize,
    alphabet: Alphabet,
    pmfs: Vec<Pmf>,
    marginals: Vec<Pmf>,
    observed: u64,
}

impl ConditionalPmfStore {
    /// Creates an empty store for the given alphabet and column count.
    pub fn new(alphabet: &Alphabet, columns: usize) -> Self {
        assert!(columns > 0);
        let count = 1 + alphabet.len() * (columns - 1);
        let pmfs = (0..count).map(|_| Pmf::new(alphabet)).collect();
        ConditionalPmfStore {
            columns,
            alphabet: alphabet.clone(),
            pmfs,
            marginals: Vec::new(),
            observed: 0,
        }
    }

    /// The column count.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// The stream alphabet.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The number of training lines accumulated so far.
    pub fn observed_lines(&self) -> u64 {
        self.observed
    }

    fn index(&self, column: usize, prev: Symbol) -> usize {
        if column == 0 {
            0
        }
        else {
            1 + (column - 1) * self.alphabet.len() + usize::from(prev)
        }
    }

    /// The PMF of the given column conditioned on the previous column's
    /// symbol. For column 0 the `prev` argument is ignored.
    pub fn cond(&self, column: usize, prev: Symbol) -> &Pmf {
        &self.pmfs[self.index(column, prev)]
    }

    fn cond_mut(&mut self, column: usize, prev: Symbol) -> &mut Pmf {
        let index = self.index(column, prev);
        &mut self.pmfs[index]
    }

    /// The marginal PMF of the given column. Only available after
    /// [`finalize`](ConditionalPmfStore::finalize).
    pub fn marginal(&self, column: usize) -> &Pmf {
        &self.marginals[column]
    }

    /// Accumulates the conditional counts of one training line.
    fn accumulate(&mut self, line: &[Symbol]) {
        debug_assert_eq!(line.len(), self.columns);
        self.cond_mut(0, 0).increment(line[0]);
        for column in 1..self.columns {
            self.cond_mut(column, line[column - 1]).increment(line[column]);
        }
        self.observed += 1;
    }

    /// Normalizes every conditional PMF and propagates the per-column
    /// marginals forward: M[0] = P(X0), M[j] = sum_v P(Xj | v) * M[j-1](v).
    fn finalize(&mut self) -> Result<()> {
        if self.observed == 0 {
            return empty_training_error();
        }

        for pmf in self.pmfs.iter_mut() {
            pmf.renormalize();
        }

        let mut marginals = Vec::with_capacity(self.columns);
        marginals.push(self.cond(0, 0).clone());
        for column in 1..self.columns {
            let mut marginal = Pmf::new(&self.alphabet);
            for v in self.alphabet.iter() {
                let weight = marginals[column - 1].probability(v);
                marginal.combine(self.cond(column, v), 1.0, weight);
            }
            marginal.renormalize();
            marginals.push(marginal);
        }

        for (column, marginal) in marginals.iter().enumerate() {
            if marginal.is_degenerate() {
                return degenerate_column_error(column as u32);
            }
        }

        self.marginals = marginals;
        Ok(())
    }

    /// Scans the training lines and computes all statistics in one pass.
    pub fn calculate_statistics<'a, I>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a [Symbol]>,
    {
        for line in lines {
            self.accumulate(line);
        }
        self.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::ConditionalPmfStore;
    use quartz_core::alphabet::Alphabet;
    use quartz_core::errors::Error;

    #[test]
    fn verify_conditional_counts() {
        let a = Alphabet::contiguous(4);
        let mut store = ConditionalPmfStore::new(&a, 3);
        let lines: [&[u8]; 4] = [&[0, 1, 2], &[0, 1, 3], &[1, 1, 2], &[0, 2, 2]];
        store.calculate_statistics(lines.iter().copied()).unwrap();

        assert!((store.cond(0, 0).probability(0) - 0.75).abs() < 1e-12);
        assert!((store.cond(0, 0).probability(1) - 0.25).abs() < 1e-12);
        // Column 1 given previous 0: symbols 1, 1, 2.
        assert!((store.cond(1, 0).probability(1) - 2.0 / 3.0).abs() < 1e-12);
        assert!((store.cond(1, 0).probability(2) - 1.0 / 3.0).abs() < 1e-12);
        // Column 2 given previous 1: symbols 2, 3, 2.
        assert!((store.cond(2, 1).probability(2) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn verify_flat_layout_accessor() {
        let a = Alphabet::contiguous(4);
        let store = ConditionalPmfStore::new(&a, 3);
        assert_eq!(store.index(0, 3), 0);
        assert_eq!(store.index(1, 0), 1);
        assert_eq!(store.index(1, 3), 4);
        assert_eq!(store.index(2, 0), 5);
        assert_eq!(store.pmfs.len(), 1 + 4 * 2);
    }

    #[test]
    fn verify_marginal_propagation() {
        let a = Alphabet::contiguous(3);
        let mut store = ConditionalPmfStore::new(&a, 2);
        // Column 0 is 0 or 1 with equal probability; 0 always moves to 2,
        // 1 stays at 1.
        let lines: [&[u8]; 2] = [&[0, 2], &[1, 1]];
        store.calculate_statistics(lines.iter().copied()).unwrap();

        let m1 = store.marginal(1);
        assert!((m1.probability(1) - 0.5).abs() < 1e-12);
        assert!((m1.probability(2) - 0.5).abs() < 1e-12);
        assert_eq!(m1.probability(0), 0.0);
    }

    #[test]
    fn verify_empty_training() {
        let a = Alphabet::contiguous(3);
        let mut store = ConditionalPmfStore::new(&a, 2);
        let lines: [&[u8]; 0] = [];
        assert!(matches!(
            store.calculate_statistics(lines.iter().copied()),
            Err(Error::EmptyTraining)
        ));
    }

    #[test]
    fn verify_degenerate_marginal_is_reported() {
        let a = Alphabet::contiguous(3);
        let mut store = ConditionalPmfStore::new(&a, 2);
        // Hand-built partial statistics: column 0 was observed but no
        // transition counts exist, so the propagated marginal of column 1
        // has no mass anywhere.
        store.cond_mut(0, 0).increment(1);
        store.observed = 1;
        assert!(matches!(store.finalize(), Err(Error::DegenerateColumn(1))));
    }
}
