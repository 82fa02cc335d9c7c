// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `alphabet` module defines the finite, ordered symbol sets all other
//! components operate over.

use smallvec::SmallVec;

/// A quality score symbol. Symbols are small unsigned integers; the full
/// alphabet of a stream never exceeds 255 symbols.
pub type Symbol = u8;

/// Sentinel index stored in the reverse-lookup table for absent symbols.
const NOT_FOUND: u8 = u8::MAX;

/// A finite, strictly ascending set of symbols with O(1) lookup in both
/// directions.
///
/// `index_of` is the inverse of `at`: for every `i < len()`,
/// `index_of(at(i)) == Some(i)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alphabet {
    symbols: SmallVec<[Symbol; 8]>,
    index: [u8; 256],
}

impl Alphabet {
    fn from_sorted(symbols: SmallVec<[Symbol; 8]>) -> Self {
        debug_assert!(symbols.len() < usize::from(u8::MAX));
        debug_assert!(symbols.windows(2).all(|w| w[0] < w[1]));

        let mut index = [NOT_FOUND; 256];
        for (i, &sym) in symbols.iter().enumerate() {
            index[usize::from(sym)] = i as u8;
        }
        Alphabet { symbols, index }
    }

    /// Creates the contiguous alphabet `{0, 1, .., size - 1}`.
    pub fn contiguous(size: usize) -> Self {
        assert!(size > 0 && size < usize::from(u8::MAX));
        Self::from_sorted((0..size as u8).collect())
    }

    /// Creates a single-symbol alphabet.
    pub fn singleton(sym: Symbol) -> Self {
        let mut symbols = SmallVec::new();
        symbols.push(sym);
        Self::from_sorted(symbols)
    }

    /// Creates an alphabet from an arbitrary list of symbols. Duplicates are
    /// removed and the result is ordered by symbol value.
    pub fn from_symbols(symbols: &[Symbol]) -> Self {
        let mut sorted: SmallVec<[Symbol; 8]> = symbols.into();
        sorted.sort_unstable();
        sorted.dedup();
        Self::from_sorted(sorted)
    }

    /// The number of symbols in the alphabet.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if the alphabet contains no symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The symbol at the given index.
    ///
    /// Panics if `index` is out of bounds.
    pub fn at(&self, index: usize) -> Symbol {
        self.symbols[index]
    }

    /// The index of the given symbol, or `None` if the symbol is not a
    /// member of the alphabet.
    pub fn index_of(&self, sym: Symbol) -> Option<usize> {
        match self.index[usize::from(sym)] {
            NOT_FOUND => None,
            i => Some(usize::from(i)),
        }
    }

    /// Returns `true` if the given symbol is a member of the alphabet.
    pub fn contains(&self, sym: Symbol) -> bool {
        self.index[usize::from(sym)] != NOT_FOUND
    }

    /// Iterates the symbols in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.symbols.iter().copied()
    }

    /// The union of two alphabets, ordered by symbol value.
    pub fn union(a: &Alphabet, b: &Alphabet) -> Alphabet {
        let mut symbols: SmallVec<[Symbol; 8]> = SmallVec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() || j < b.len() {
            let next = match (a.symbols.get(i), b.symbols.get(j)) {
                (Some(&x), Some(&y)) if x == y => {
                    i += 1;
                    j += 1;
                    x
                }
                (Some(&x), Some(&y)) if x < y => {
                    i += 1;
                    x
                }
                (Some(_), Some(&y)) => {
                    j += 1;
                    y
                }
                (Some(&x), None) => {
                    i += 1;
                    x
                }
                (None, Some(&y)) => {
                    j += 1;
                    y
                }
                (None, None) => unreachable!(),
            };
            symbols.push(next);
        }
        Self::from_sorted(symbols)
    }
}
