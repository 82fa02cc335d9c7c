// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `pmf` module implements probability mass functions over an
//! [`Alphabet`].
//!
//! A PMF is created *unready*: its weights are raw accumulated counts.
//! [`Pmf::renormalize`] divides the weights by their sum and marks the PMF
//! ready, after which probabilities and entropy may be queried. A ready PMF
//! whose weights summed to zero is *degenerate*: it stays all-zero and its
//! entropy is zero.

use crate::alphabet::{Alphabet, Symbol};

/// A probability mass function over an alphabet.
#[derive(Clone, Debug)]
pub struct Pmf {
    alphabet: Alphabet,
    weights: Vec<f64>,
    ready: bool,
}

impl Pmf {
    /// Creates an all-zero, unready PMF over the given alphabet.
    pub fn new(alphabet: &Alphabet) -> Self {
        Pmf { alphabet: alphabet.clone(), weights: vec![0.0; alphabet.len()], ready: false }
    }

    /// Creates an unready PMF from raw weights. The weight vector length
    /// must equal the alphabet size.
    pub fn from_weights(alphabet: &Alphabet, weights: Vec<f64>) -> Self {
        assert_eq!(weights.len(), alphabet.len());
        debug_assert!(weights.iter().all(|&w| w >= 0.0));
        Pmf { alphabet: alphabet.clone(), weights, ready: false }
    }

    /// The alphabet this PMF is defined over.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Returns `true` once the PMF has been renormalized.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns `true` if the PMF carries no mass at all.
    pub fn is_degenerate(&self) -> bool {
        self.weights.iter().all(|&w| w == 0.0)
    }

    /// Adds one observation of the given symbol.
    ///
    /// Panics if the PMF is already normalized or the symbol is not in the
    /// alphabet: statistics gathering runs strictly before normalization and
    /// on loader-validated symbols.
    pub fn increment(&mut self, sym: Symbol) {
        assert!(!self.ready, "increment on a normalized pmf");
        let index = self.alphabet.index_of(sym).expect("symbol outside pmf alphabet");
        self.weights[index] += 1.0;
    }

    /// Adds raw weight at the given alphabet index. Pre-normalization only.
    pub fn add_weight(&mut self, index: usize, weight: f64) {
        assert!(!self.ready, "add_weight on a normalized pmf");
        debug_assert!(weight >= 0.0);
        self.weights[index] += weight;
    }

    /// The probability of the symbol at the given alphabet index.
    ///
    /// Panics if the PMF has not been renormalized.
    pub fn prob_at(&self, index: usize) -> f64 {
        assert!(self.ready, "probability query on an unnormalized pmf");
        self.weights[index]
    }

    /// The probability of the given symbol, or 0 if the symbol is not a
    /// member of the alphabet.
    pub fn probability(&self, sym: Symbol) -> f64 {
        match self.alphabet.index_of(sym) {
            Some(index) => self.prob_at(index),
            None => 0.0,
        }
    }

    /// Divides every weight by the total and marks the PMF ready. A
    /// zero-total PMF stays all-zero (degenerate) but still becomes ready.
    pub fn renormalize(&mut self) {
        let total: f64 = self.weights.iter().sum();
        if total > 0.0 {
            for w in self.weights.iter_mut() {
                *w /= total;
            }
        }
        self.ready = true;
    }

    /// The Shannon entropy, in bits. Zero-probability terms contribute
    /// nothing; a degenerate PMF has entropy zero.
    ///
    /// Panics if the PMF has not been renormalized.
    pub fn entropy(&self) -> f64 {
        assert!(self.ready, "entropy of an unnormalized pmf");
        -self
            .weights
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| p * p.log2())
            .sum::<f64>()
    }

    /// Pointwise mix: `self <- alpha * self + beta * other`.
    ///
    /// Both PMFs must share an alphabet. The readiness flag is left
    /// untouched; mixing ready PMFs with convex weights keeps them
    /// normalized, anything else should be followed by [`renormalize`].
    ///
    /// [`renormalize`]: Pmf::renormalize
    pub fn combine(&mut self, other: &Pmf, alpha: f64, beta: f64) {
        assert_eq!(self.alphabet, other.alphabet);
        for (w, &o) in self.weights.iter_mut().zip(other.weights.iter()) {
            *w = alpha * *w + beta * o;
        }
    }
}
