// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `format` module implements the bit-exact on-disk representation: the
//! archive container header and the per-cluster codebook blocks.
//!
//! A codebook block is newline-delimited printable text. Every symbol byte
//! is offset by 33 (the same offset the quality lines use), absent context
//! slots are padded with ASCII spaces. For C columns over an S-symbol
//! alphabet the block is:
//!
//! - two C-byte placeholder lines (reserved for per-column state counts;
//!   written as spaces, skipped on read);
//! - one C-byte line of per-column selection ratios,
//!   `floor(ratio * 100) + 33`; only the context-0 ratio of each column is
//!   persisted and the decoder reuses it for every context;
//! - the column-0 low and high quantizers, S bytes each;
//! - for every further column, a low line and a high line of S*S bytes:
//!   S concatenated quantizers, the v-th block belonging to left-context
//!   symbol v.

use std::io::{BufRead, Write};

use quartz_core::alphabet::{Alphabet, Symbol};
use quartz_core::errors::{malformed_archive_error, malformed_codebook_error, Result};
use quartz_core::io::{ReadBytes, WriteBytes};
use quartz_core::quantizer::Quantizer;
use quartz_core::sample::SYMBOL_OFFSET;

use crate::codebook::{output_union, ConditionalQuantizerFamily, QuantizerPair};

/// Archive magic bytes.
pub const ARCHIVE_MAGIC: [u8; 4] = *b"QRTZ";

/// Archive format version.
pub const FORMAT_VERSION: u8 = 1;

const NEWLINE: u8 = b'\n';
const PAD: u8 = b' ';

/// Everything the decoder needs before the first codebook block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub alphabet_size: u8,
    pub clusters: u16,
    pub columns: u32,
    pub lines: u64,
    pub seed: u32,
}

/// Writes the archive header.
pub fn write_header<W: Write>(out: &mut W, header: &ArchiveHeader) -> Result<()> {
    out.write_buf(&ARCHIVE_MAGIC)?;
    out.write_byte(FORMAT_VERSION)?;
    out.write_byte(header.alphabet_size)?;
    out.write_u16(header.clusters)?;
    out.write_u32(header.columns)?;
    out.write_u64(header.lines)?;
    out.write_u32(header.seed)
}

/// Reads and validates the archive header.
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<ArchiveHeader> {
    let mut magic = [0u8; 4];
    reader.read_buf_exact(&mut magic)?;
    if magic != ARCHIVE_MAGIC {
        return malformed_archive_error("bad magic");
    }
    if reader.read_byte()? != FORMAT_VERSION {
        return malformed_archive_error("unsupported format version");
    }

    let header = ArchiveHeader {
        alphabet_size: reader.read_byte()?,
        clusters: reader.read_u16()?,
        columns: reader.read_u32()?,
        lines: reader.read_u64()?,
        seed: reader.read_u32()?,
    };

    if header.alphabet_size == 0 {
        return malformed_archive_error("empty alphabet");
    }
    // Symbols are stored as `value + 33`, which must stay within a byte.
    if header.alphabet_size > 223 {
        return malformed_archive_error("alphabet too wide for the printable format");
    }
    if header.clusters == 0 {
        return malformed_archive_error("no clusters");
    }
    if header.columns == 0 {
        return malformed_archive_error("no columns");
    }
    if header.lines == 0 {
        return malformed_archive_error("no lines");
    }
    Ok(header)
}

fn quantizer_bytes(q: &Quantizer, line: &mut Vec<u8>) {
    for &rep in q.raw_map() {
        line.push(rep + SYMBOL_OFFSET);
    }
}

/// Serializes one family as a codebook block.
pub fn write_codebook<W: Write>(out: &mut W, family: &ConditionalQuantizerFamily) -> Result<()> {
    let columns = family.columns();
    let size = family.alphabet().len();
    let mut line = Vec::with_capacity(size * size);

    // Two placeholder lines, then the per-column ratios.
    for _ in 0..2 {
        line.clear();
        line.resize(columns, PAD);
        line.push(NEWLINE);
        out.write_buf(&line)?;
    }
    line.clear();
    for column in 0..columns {
        line.push(family.select_ratio(column) + SYMBOL_OFFSET);
    }
    line.push(NEWLINE);
    out.write_buf(&line)?;

    // Column 0 has exactly one context.
    let first = family.pair_at(0, 0);
    for q in [&first.lo, &first.hi] {
        line.clear();
        quantizer_bytes(q, &mut line);
        line.push(NEWLINE);
        out.write_buf(&line)?;
    }

    // Remaining columns: a low line and a high line of S blocks each.
    for column in 1..columns {
        for leg in 0..2 {
            line.clear();
            for v in 0..size {
                match family.pair_by_symbol(column, family.alphabet().at(v)) {
                    Some(pair) => {
                        let q = if leg == 0 { &pair.lo } else { &pair.hi };
                        quantizer_bytes(q, &mut line);
                    }
                    None => line.resize(line.len() + size, PAD),
                }
            }
            line.push(NEWLINE);
            out.write_buf(&line)?;
        }
    }
    Ok(())
}

fn read_record<'a, R: BufRead>(reader: &mut R, buf: &'a mut Vec<u8>) -> Result<&'a [u8]> {
    buf.clear();
    if reader.read_until(NEWLINE, buf)? == 0 {
        return malformed_codebook_error("truncated codebook");
    }
    if buf.last() == Some(&NEWLINE) {
        buf.pop();
    }
    Ok(buf.as_slice())
}

fn parse_quantizer(bytes: &[u8], alphabet: &Alphabet, ratio: f64) -> Result<Quantizer> {
    let mut map = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        if byte < SYMBOL_OFFSET {
            return malformed_codebook_error("quantizer byte below the symbol offset");
        }
        let sym = byte - SYMBOL_OFFSET;
        if !alphabet.contains(sym) {
            return malformed_codebook_error("quantizer symbol outside the alphabet");
        }
        map.push(sym);
    }
    Ok(Quantizer::from_map(alphabet, map, ratio))
}

/// Parses one codebook block into a family over the given alphabet, seeding
/// its selection PRNG with the archive seed.
pub fn read_codebook<R: BufRead>(
    reader: &mut R,
    alphabet: &Alphabet,
    seed: u32,
) -> Result<ConditionalQuantizerFamily> {
    let size = alphabet.len();
    let mut buf = Vec::new();

    // The first placeholder line fixes the column count; the second is
    // reserved and skipped.
    let columns = read_record(reader, &mut buf)?.len();
    if columns == 0 {
        return malformed_codebook_error("empty codebook header line");
    }
    if read_record(reader, &mut buf)?.len() != columns {
        return malformed_codebook_error("placeholder line length mismatch");
    }

    let record = read_record(reader, &mut buf)?;
    if record.len() != columns {
        return malformed_codebook_error("ratio line length mismatch");
    }
    let mut ratios = Vec::with_capacity(columns);
    for &byte in record {
        if byte < SYMBOL_OFFSET || byte > SYMBOL_OFFSET + 100 {
            return malformed_codebook_error("ratio byte out of range");
        }
        ratios.push(byte - SYMBOL_OFFSET);
    }

    let mut family = ConditionalQuantizerFamily::new(alphabet, seed);

    let ratio = f64::from(ratios[0]) / 100.0;
    let record = read_record(reader, &mut buf)?;
    if record.len() != size {
        return malformed_codebook_error("column-0 quantizer length mismatch");
    }
    let lo = parse_quantizer(record, alphabet, ratio)?;
    let record = read_record(reader, &mut buf)?;
    if record.len() != size {
        return malformed_codebook_error("column-0 quantizer length mismatch");
    }
    let hi = parse_quantizer(record, alphabet, 1.0 - ratio)?;
    family.push_column(
        Alphabet::singleton(0),
        vec![QuantizerPair { lo, hi, ratio }],
        ratios[0],
    );

    let mut lo_line = Vec::new();
    let mut hi_line = Vec::new();
    for column in 1..columns {
        let ratio = f64::from(ratios[column]) / 100.0;

        if read_record(reader, &mut lo_line)?.len() != size * size {
            return malformed_codebook_error("conditional record length mismatch");
        }
        if read_record(reader, &mut hi_line)?.len() != size * size {
            return malformed_codebook_error("conditional record length mismatch");
        }

        let mut present: Vec<Symbol> = Vec::new();
        let mut pairs = Vec::new();
        for v in 0..size {
            let lo_block = &lo_line[v * size..(v + 1) * size];
            let hi_block = &hi_line[v * size..(v + 1) * size];
            let lo_absent = lo_block.iter().all(|&b| b == PAD);
            let hi_absent = hi_block.iter().all(|&b| b == PAD);
            match (lo_absent, hi_absent) {
                (true, true) => continue,
                (false, false) => {
                    present.push(alphabet.at(v));
                    pairs.push(QuantizerPair {
                        lo: parse_quantizer(lo_block, alphabet, ratio)?,
                        hi: parse_quantizer(hi_block, alphabet, 1.0 - ratio)?,
                        ratio,
                    });
                }
                _ => return malformed_codebook_error("half of a quantizer pair is missing"),
            }
        }

        // The context set must be exactly what the previous column's
        // quantizers can produce.
        if present.is_empty() {
            return malformed_codebook_error("column has no quantizers");
        }
        let expected = output_union(family.pairs_at(column - 1));
        let contexts = Alphabet::from_symbols(&present);
        if contexts != expected {
            return malformed_codebook_error("context set does not match the previous column");
        }

        family.push_column(contexts, pairs, ratios[column]);
    }

    Ok(family)
}
