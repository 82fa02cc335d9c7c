// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `sample` module owns the in-memory training data model and the text
//! loader that fills it.
//!
//! Input is one quality line per text line, every line the same length, each
//! byte encoding symbol `byte - 33` (the printable Phred convention; the
//! codebook file format uses the same offset). Lines are stored flattened in
//! fixed-capacity blocks.

use std::io::BufRead;

use log::debug;

use crate::alphabet::{Alphabet, Symbol};
use crate::errors::{empty_training_error, malformed_input_error, Result};

/// The offset that maps a symbol onto a printable ASCII byte.
pub const SYMBOL_OFFSET: u8 = 33;

/// Number of lines stored per block.
const BLOCK_LINES: usize = 1 << 16;

struct LineBlock {
    data: Vec<Symbol>,
    count: usize,
}

/// A fixed-column-count corpus of quality lines.
pub struct QualitySample {
    columns: usize,
    lines: u64,
    alphabet: Alphabet,
    blocks: Vec<LineBlock>,
}

impl QualitySample {
    /// Creates an empty sample with a known column count.
    pub fn new(alphabet: &Alphabet, columns: usize) -> Self {
        assert!(columns > 0);
        QualitySample { columns, lines: 0, alphabet: alphabet.clone(), blocks: Vec::new() }
    }

    /// Loads quality lines from a reader.
    ///
    /// The first line fixes the column count. A ragged or out-of-alphabet
    /// line is a [`MalformedInput`](crate::errors::Error::MalformedInput)
    /// error; an input with no lines at all is
    /// [`EmptyTraining`](crate::errors::Error::EmptyTraining). `max_lines`
    /// caps how many lines are kept, with 0 meaning all of them.
    pub fn from_reader<R: BufRead>(
        mut reader: R,
        alphabet: &Alphabet,
        max_lines: u64,
    ) -> Result<Self> {
        let mut sample: Option<QualitySample> = None;
        let mut raw = Vec::new();
        let mut scratch = Vec::new();

        loop {
            if max_lines != 0 {
                if let Some(ref s) = sample {
                    if s.lines >= max_lines {
                        break;
                    }
                }
            }

            raw.clear();
            if reader.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            if raw.last() == Some(&b'\n') {
                raw.pop();
            }
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
            // A trailing newline produces one final empty read; real empty
            // lines inside the stream are malformed.
            if raw.is_empty() {
                if reader.fill_buf()?.is_empty() {
                    break;
                }
                return malformed_input_error("empty line in quality stream");
            }

            scratch.clear();
            for &byte in raw.iter() {
                if byte < SYMBOL_OFFSET {
                    return malformed_input_error("byte below the printable symbol offset");
                }
                let sym = byte - SYMBOL_OFFSET;
                if !alphabet.contains(sym) {
                    return malformed_input_error("symbol outside the stream alphabet");
                }
                scratch.push(sym);
            }

            match sample {
                None => {
                    let mut s = QualitySample::new(alphabet, scratch.len());
                    s.push_line(&scratch);
                    sample = Some(s);
                }
                Some(ref mut s) => {
                    if scratch.len() != s.columns {
                        return malformed_input_error("line length differs from first line");
                    }
                    s.push_line(&scratch);
                }
            }
        }

        match sample {
            Some(s) => {
                debug!("loaded {} lines of {} columns", s.lines, s.columns);
                Ok(s)
            }
            None => empty_training_error(),
        }
    }

    /// Appends one line. The line length must equal the column count.
    pub fn push_line(&mut self, line: &[Symbol]) {
        assert_eq!(line.len(), self.columns);
        let needs_block = match self.blocks.last() {
            Some(block) => block.count == BLOCK_LINES,
            None => true,
        };
        if needs_block {
            self.blocks.push(LineBlock { data: Vec::new(), count: 0 });
        }
        let block = self.blocks.last_mut().unwrap();
        block.data.extend_from_slice(line);
        block.count += 1;
        self.lines += 1;
    }

    /// The column count shared by every line.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// The number of lines.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// The stream alphabet.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The line at the given index.
    ///
    /// Panics if the index is out of range.
    pub fn line(&self, index: u64) -> &[Symbol] {
        let block = &self.blocks[(index as usize) / BLOCK_LINES];
        let offset = ((index as usize) % BLOCK_LINES) * self.columns;
        &block.data[offset..offset + self.columns]
    }

    /// Iterates the lines in input order.
    pub fn iter(&self) -> impl Iterator<Item = &[Symbol]> {
        let columns = self.columns;
        self.blocks.iter().flat_map(move |block| block.data.chunks_exact(columns))
    }
}

#[cfg(test)]
mod tests {
    use super::{QualitySample, SYMBOL_OFFSET};
    use crate::alphabet::Alphabet;
    use crate::errors::Error;

    fn load(bytes: &[u8]) -> Result<QualitySample, Error> {
        QualitySample::from_reader(bytes, &Alphabet::contiguous(41), 0)
    }

    #[test]
    fn verify_loads_phred_lines() {
        let sample = load(b"!!#\n((+\n").unwrap();
        assert_eq!(sample.columns(), 3);
        assert_eq!(sample.lines(), 2);
        assert_eq!(sample.line(0), &[0, 0, 2]);
        assert_eq!(sample.line(1), &[7, 7, 10]);
        assert_eq!(sample.iter().count(), 2);
    }

    #[test]
    fn verify_missing_final_newline_and_crlf() {
        let sample = load(b"!!#\r\n((+").unwrap();
        assert_eq!(sample.lines(), 2);
        assert_eq!(sample.line(1), &[7, 7, 10]);
    }

    #[test]
    fn verify_ragged_line_is_malformed() {
        assert!(matches!(load(b"!!#\n((\n"), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn verify_out_of_alphabet_symbol_is_malformed() {
        // 'J' encodes symbol 41, one past the 41-symbol alphabet.
        assert!(matches!(load(b"!!J\n"), Err(Error::MalformedInput(_))));
        // A byte below the offset can never encode a symbol.
        assert!(matches!(load(b"!! \n"), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn verify_empty_input() {
        assert!(matches!(load(b""), Err(Error::EmptyTraining)));
    }

    #[test]
    fn verify_line_cap() {
        let sample =
            QualitySample::from_reader(&b"!!\n##\n%%\n"[..], &Alphabet::contiguous(41), 2)
                .unwrap();
        assert_eq!(sample.lines(), 2);
    }

    #[test]
    fn verify_offset_matches_codebook_format() {
        assert_eq!(SYMBOL_OFFSET, 33);
    }
}
