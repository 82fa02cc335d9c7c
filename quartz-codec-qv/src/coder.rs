// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `coder` module implements the arithmetic-coded entropy back-end.
//!
//! The range coder is byte-oriented with a 64-bit low register and a 32-bit
//! range. Carries are deferred through a cache byte, so the encoder can emit
//! straight to any writer. The decoder consumes an in-memory payload and
//! yields zero bytes past its end, which lets it renormalize freely after
//! the final symbol.
//!
//! Symbol statistics are adaptive frequency models. Encoder and decoder
//! update their models identically, so the stream carries no tables.

use std::io::Write;

use quartz_core::errors::Result;
use quartz_core::io::WriteBytes;

/// Renormalization threshold. The range never drops below 2^24, so a
/// frequency total bounded by 2^16 always leaves a nonzero slice per symbol.
const TOP: u32 = 1 << 24;

/// Count added to a symbol's frequency on every update.
const INCREMENT: u32 = 32;

/// Halve all frequencies once the total exceeds this bound.
const MAX_TOTAL: u32 = 1 << 16;

/// A range encoder writing to `W`.
pub struct RangeEncoder<W: Write> {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    sink: W,
}

impl<W: Write> RangeEncoder<W> {
    pub fn new(sink: W) -> Self {
        RangeEncoder { low: 0, range: u32::MAX, cache: 0, cache_size: 1, sink }
    }

    fn shift_low(&mut self) -> Result<()> {
        if (self.low as u32) < 0xff00_0000 || (self.low >> 32) != 0 {
            let carry = (self.low >> 32) as u8;
            let mut byte = self.cache;
            loop {
                self.sink.write_byte(byte.wrapping_add(carry))?;
                byte = 0xff;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = (self.low >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = u64::from(self.low as u32) << 8;
        Ok(())
    }

    /// Narrows the interval to the slice `[cumulative, cumulative + freq)`
    /// out of `total`.
    pub fn encode(&mut self, cumulative: u32, freq: u32, total: u32) -> Result<()> {
        debug_assert!(freq > 0 && cumulative + freq <= total);
        let slice = self.range / total;
        self.low += u64::from(slice) * u64::from(cumulative);
        self.range = slice * freq;
        while self.range < TOP {
            self.range <<= 8;
            self.shift_low()?;
        }
        Ok(())
    }

    /// Flushes the interval state and returns the writer.
    pub fn finish(mut self) -> Result<W> {
        for _ in 0..5 {
            self.shift_low()?;
        }
        Ok(self.sink)
    }
}

/// A range decoder over an in-memory payload.
pub struct RangeDecoder {
    code: u32,
    range: u32,
    payload: Vec<u8>,
    position: usize,
}

impl RangeDecoder {
    pub fn new(payload: Vec<u8>) -> Self {
        let mut decoder = RangeDecoder { code: 0, range: u32::MAX, payload, position: 0 };
        // The first byte is the encoder's cache placeholder.
        decoder.next_byte();
        for _ in 0..4 {
            decoder.code = (decoder.code << 8) | u32::from(decoder.next_byte());
        }
        decoder
    }

    fn next_byte(&mut self) -> u8 {
        let byte = self.payload.get(self.position).copied().unwrap_or(0);
        self.position += 1;
        byte
    }

    /// Returns the cumulative frequency the encoder's slice covered. The
    /// caller locates the matching symbol and then calls
    /// [`advance`](RangeDecoder::advance) with that symbol's interval.
    pub fn decode_freq(&mut self, total: u32) -> u32 {
        let slice = self.range / total;
        (self.code / slice).min(total - 1)
    }

    /// Consumes the located symbol's interval.
    pub fn advance(&mut self, cumulative: u32, freq: u32, total: u32) {
        let slice = self.range / total;
        self.code -= slice * cumulative;
        self.range = slice * freq;
        while self.range < TOP {
            self.code = (self.code << 8) | u32::from(self.next_byte());
            self.range <<= 8;
        }
    }
}

/// An adaptive frequency model over a fixed symbol count.
#[derive(Clone, Debug)]
pub struct AdaptiveModel {
    counts: Vec<u32>,
    total: u32,
}

impl AdaptiveModel {
    /// Creates a uniform model over `symbols` symbols.
    pub fn new(symbols: usize) -> Self {
        assert!(symbols > 0);
        AdaptiveModel { counts: vec![1; symbols], total: symbols as u32 }
    }

    /// The number of symbols the model covers.
    pub fn symbols(&self) -> usize {
        self.counts.len()
    }

    fn update(&mut self, symbol: usize) {
        self.counts[symbol] += INCREMENT;
        self.total += INCREMENT;
        if self.total > MAX_TOTAL {
            self.total = 0;
            for count in self.counts.iter_mut() {
                *count = (*count >> 1).max(1);
                self.total += *count;
            }
        }
    }

    /// Encodes one symbol and adapts.
    pub fn encode<W: Write>(&mut self, encoder: &mut RangeEncoder<W>, symbol: usize) -> Result<()> {
        let cumulative: u32 = self.counts[..symbol].iter().sum();
        encoder.encode(cumulative, self.counts[symbol], self.total)?;
        self.update(symbol);
        Ok(())
    }

    /// Decodes one symbol and adapts.
    pub fn decode(&mut self, decoder: &mut RangeDecoder) -> usize {
        let target = decoder.decode_freq(self.total);
        let mut cumulative = 0;
        let mut symbol = self.counts.len() - 1;
        for (i, &count) in self.counts.iter().enumerate() {
            if cumulative + count > target {
                symbol = i;
                break;
            }
            cumulative += count;
        }
        decoder.advance(cumulative, self.counts[symbol], self.total);
        self.update(symbol);
        symbol
    }
}
