// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lossy quality value codec built on conditional quantizer codebooks.
//!
//! Encoding clusters the corpus, trains one conditional quantizer family
//! per cluster, persists the families, then arithmetic-codes every line
//! against them. Decoding rebuilds the same families from the archive and
//! replays the identical quantizer selections, so the reconstruction equals
//! the lossy stream the encoder saw.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Quartz crates. Please see the
// workspace Cargo.toml for their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_range_contains)]

pub mod cluster;
pub mod codebook;
pub mod coder;
pub mod format;
pub mod stats;

use std::io::{BufReader, Read, Write};
use std::time::{Duration, Instant};

use log::{debug, info};

use quartz_core::alphabet::Alphabet;
use quartz_core::distortion::{DistortionMetric, DistortionTable};
use quartz_core::errors::{
    invalid_config_error, malformed_archive_error, malformed_codebook_error, Result,
};
use quartz_core::io::{CountingWriter, WriteBytes};
use quartz_core::sample::{QualitySample, SYMBOL_OFFSET};

use crate::cluster::kmeans;
use crate::codebook::{generate_codebooks, ConditionalQuantizerFamily, Leg};
use crate::coder::{AdaptiveModel, RangeDecoder, RangeEncoder};
use crate::format::{read_codebook, read_header, write_codebook, write_header, ArchiveHeader};
use crate::stats::ConditionalPmfStore;

/// Seed used when the caller does not pick one. The seed travels in the
/// archive header, so changing it never breaks old archives.
pub const DEFAULT_SEED: u32 = 0x6a09_e667;

/// Encoder configuration.
#[derive(Clone, Copy, Debug)]
pub struct EncodeOptions {
    /// Target compression fraction in `[0, 1]`: each conditional entropy is
    /// scaled by this factor before state allocation.
    pub comp: f64,
    /// Distortion metric the quantizers optimize.
    pub metric: DistortionMetric,
    /// Number of k-means clusters, each with its own codebook family.
    pub clusters: usize,
    /// Cluster center movement threshold (L2 norm) declaring convergence.
    pub cluster_threshold: f64,
    /// Cap on training lines per cluster; 0 trains on everything.
    pub training_lines: u64,
    /// Seed for the quantizer-selection PRNG.
    pub seed: u32,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            comp: 0.5,
            metric: DistortionMetric::Mse,
            clusters: 1,
            cluster_threshold: 4.0,
            training_lines: 1_000_000,
            seed: DEFAULT_SEED,
        }
    }
}

/// What an encode run produced.
#[derive(Clone, Copy, Debug)]
pub struct EncodeReport {
    pub lines: u64,
    pub columns: usize,
    pub clusters: usize,
    pub bytes_written: u64,
    /// Design-time expected per-symbol distortion, averaged over clusters.
    pub expected_distortion: f64,
    /// Per-symbol distortion actually incurred on the input.
    pub measured_distortion: f64,
    /// Wall time spent clustering.
    pub cluster_time: Duration,
    /// Wall time spent on statistics and codebook generation.
    pub codebook_time: Duration,
    /// Wall time spent entropy coding.
    pub coding_time: Duration,
}

/// What a decode run produced.
#[derive(Clone, Copy, Debug)]
pub struct DecodeReport {
    pub lines: u64,
    pub columns: usize,
    pub clusters: usize,
}

/// Per-cluster adaptive models, one per (column, context, leg), created on
/// first use. Encoder and decoder touch models in the same order, so lazy
/// creation stays in lockstep.
struct ModelTable {
    slots: Vec<Vec<Vec<Option<AdaptiveModel>>>>,
}

impl ModelTable {
    fn new(families: &[ConditionalQuantizerFamily]) -> Self {
        let slots = families
            .iter()
            .map(|family| {
                (0..family.columns())
                    .map(|column| vec![None; 2 * family.context_alphabet(column).len()])
                    .collect()
            })
            .collect();
        ModelTable { slots }
    }

    fn model(
        &mut self,
        cluster: usize,
        column: usize,
        context_index: usize,
        leg: Leg,
        states: usize,
    ) -> &mut AdaptiveModel {
        let slot = 2 * context_index + usize::from(leg == Leg::Hi);
        self.slots[cluster][column][slot].get_or_insert_with(|| AdaptiveModel::new(states))
    }
}

/// Compresses the sample into a self-describing archive, optionally writing
/// the lossy reconstruction alongside.
pub fn encode<W: Write>(
    sample: &QualitySample,
    opts: &EncodeOptions,
    out: W,
    mut lossy_out: Option<&mut dyn Write>,
) -> Result<EncodeReport> {
    let alphabet = sample.alphabet();
    let columns = sample.columns();
    if alphabet.len() > 223 {
        return invalid_config_error("alphabet too wide for the printable format");
    }
    let dist = DistortionTable::build(alphabet.len(), opts.metric);

    let cluster_start = Instant::now();
    let clusters = kmeans(sample, opts.clusters, opts.cluster_threshold)?;
    let cluster_time = cluster_start.elapsed();
    info!("clustered {} lines into {} clusters", sample.lines(), clusters.count());

    let codebook_start = Instant::now();
    let mut families = Vec::with_capacity(clusters.count());
    let mut expected_distortion = 0.0;
    for cluster in 0..clusters.count() {
        let cap = match opts.training_lines {
            0 => usize::MAX,
            n => n.min(usize::MAX as u64) as usize,
        };
        let mut stats = ConditionalPmfStore::new(alphabet, columns);
        stats.calculate_statistics(
            sample
                .iter()
                .zip(clusters.assignments().iter())
                .filter(|(_, &c)| usize::from(c) == cluster)
                .map(|(line, _)| line)
                .take(cap),
        )?;
        debug!("cluster {}: {} training lines", cluster, stats.observed_lines());

        let (family, expected) = generate_codebooks(&stats, &dist, opts.comp, opts.seed)?;
        let weight = clusters.population(cluster) as f64 / sample.lines() as f64;
        expected_distortion += weight * expected;
        families.push(family);
    }
    let codebook_time = codebook_start.elapsed();

    let coding_start = Instant::now();
    let mut counting = CountingWriter::new(out);
    let header = ArchiveHeader {
        alphabet_size: alphabet.len() as u8,
        clusters: clusters.count() as u16,
        columns: columns as u32,
        lines: sample.lines(),
        seed: opts.seed,
    };
    write_header(&mut counting, &header)?;
    for family in families.iter() {
        write_codebook(&mut counting, family)?;
    }

    let mut models = ModelTable::new(&families);
    let mut cluster_model = AdaptiveModel::new(clusters.count());
    let mut encoder = RangeEncoder::new(&mut counting);
    let mut distortion_total = 0.0;
    let mut reconstruction = Vec::with_capacity(columns + 1);

    for (line, &cluster) in sample.iter().zip(clusters.assignments().iter()) {
        let cluster = usize::from(cluster);
        cluster_model.encode(&mut encoder, cluster)?;

        let family = &mut families[cluster];
        let mut prev = 0;
        reconstruction.clear();
        for (column, &sym) in line.iter().enumerate() {
            let selection = family.select(column, prev)?;
            let reproduction = selection.quantizer.map(sym);
            let code = match selection.quantizer.code_index(reproduction) {
                Some(code) => code,
                None => return malformed_codebook_error("reproduction missing from output"),
            };

            let model = models.model(
                cluster,
                column,
                selection.context_index,
                selection.leg,
                selection.quantizer.states(),
            );
            model.encode(&mut encoder, code)?;

            distortion_total += dist.cost(sym, reproduction);
            reconstruction.push(reproduction + SYMBOL_OFFSET);
            prev = reproduction;
        }

        if let Some(ref mut sink) = lossy_out {
            reconstruction.push(b'\n');
            sink.write_buf(&reconstruction)?;
        }
    }

    let sink = encoder.finish()?;
    sink.flush()?;

    let symbols = sample.lines() as f64 * columns as f64;
    Ok(EncodeReport {
        lines: sample.lines(),
        columns,
        clusters: clusters.count(),
        bytes_written: counting.count(),
        expected_distortion,
        measured_distortion: distortion_total / symbols,
        cluster_time,
        codebook_time,
        coding_time: coding_start.elapsed(),
    })
}

/// Decompresses an archive, writing one reconstructed quality line per
/// input line.
pub fn decode<R: Read, W: Write>(input: R, mut out: W) -> Result<DecodeReport> {
    let mut reader = BufReader::new(input);
    let header = read_header(&mut reader)?;
    let alphabet = Alphabet::contiguous(usize::from(header.alphabet_size));
    let columns = header.columns as usize;

    let mut families = Vec::with_capacity(usize::from(header.clusters));
    for _ in 0..header.clusters {
        let family = read_codebook(&mut reader, &alphabet, header.seed)?;
        if family.columns() != columns {
            return malformed_archive_error("codebook column count disagrees with the header");
        }
        families.push(family);
    }

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    let mut decoder = RangeDecoder::new(payload);

    let mut models = ModelTable::new(&families);
    let mut cluster_model = AdaptiveModel::new(usize::from(header.clusters));
    let mut line = Vec::with_capacity(columns + 1);

    for _ in 0..header.lines {
        let cluster = cluster_model.decode(&mut decoder);
        let family = &mut families[cluster];

        let mut prev = 0;
        line.clear();
        for column in 0..columns {
            let selection = family.select(column, prev)?;
            let model = models.model(
                cluster,
                column,
                selection.context_index,
                selection.leg,
                selection.quantizer.states(),
            );
            let code = model.decode(&mut decoder);
            let reproduction = selection.quantizer.output_alphabet().at(code);
            line.push(reproduction + SYMBOL_OFFSET);
            prev = reproduction;
        }
        line.push(b'\n');
        out.write_buf(&line)?;
    }

    Ok(DecodeReport {
        lines: header.lines,
        columns,
        clusters: usize::from(header.clusters),
    })
}
