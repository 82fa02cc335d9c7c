// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use quartz_codec_qv::{decode, encode, EncodeOptions};
use quartz_core::alphabet::Alphabet;
use quartz_core::distortion::DistortionMetric;
use quartz_core::sample::{QualitySample, SYMBOL_OFFSET};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const ALPHABET: usize = 41;

/// Quality-like corpus: column 0 sits near a base value, every later
/// column random-walks one step at most, like real per-base quality decay.
fn correlated_sample(columns: usize, lines: usize, seed: u64) -> QualitySample {
    let alphabet = Alphabet::contiguous(ALPHABET);
    let mut sample = QualitySample::new(&alphabet, columns);
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut line = vec![0u8; columns];
    for _ in 0..lines {
        let mut value: i32 = 20 + rng.gen_range(-1..=1);
        for slot in line.iter_mut() {
            *slot = value as u8;
            value = (value + rng.gen_range(-1..=1)).clamp(0, ALPHABET as i32 - 1);
        }
        sample.push_line(&line);
    }
    sample
}

fn iid_sample(symbols: u8, columns: usize, lines: usize, seed: u64) -> QualitySample {
    let alphabet = Alphabet::contiguous(ALPHABET);
    let mut sample = QualitySample::new(&alphabet, columns);
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut line = vec![0u8; columns];
    for _ in 0..lines {
        for slot in line.iter_mut() {
            *slot = rng.gen_range(0..symbols);
        }
        sample.push_line(&line);
    }
    sample
}

fn decode_lines(archive: &[u8]) -> Vec<Vec<u8>> {
    let mut text = Vec::new();
    decode(archive, &mut text).unwrap();
    text.split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| line.iter().map(|&b| b - SYMBOL_OFFSET).collect())
        .collect()
}

fn mean_l1(sample: &QualitySample, decoded: &[Vec<u8>]) -> f64 {
    let mut total = 0.0;
    for (original, reconstructed) in sample.iter().zip(decoded.iter()) {
        for (&a, &b) in original.iter().zip(reconstructed.iter()) {
            total += (f64::from(a) - f64::from(b)).abs();
        }
    }
    total / (sample.lines() as f64 * sample.columns() as f64)
}

#[test]
fn round_trip_recovers_a_close_stream() {
    let sample = correlated_sample(24, 3000, 100);
    let opts = EncodeOptions { comp: 0.5, ..Default::default() };

    let mut archive = Vec::new();
    let report = encode(&sample, &opts, &mut archive, None).unwrap();
    assert_eq!(report.lines, 3000);
    assert!(report.bytes_written as usize == archive.len());
    // Half-rate coding of a slow random walk must stay well below one
    // quality step of error per symbol on average.
    assert!(report.measured_distortion >= 0.0);

    let decoded = decode_lines(&archive);
    assert_eq!(decoded.len(), 3000);
    assert!(decoded.iter().all(|line| line.len() == 24));
    assert!(mean_l1(&sample, &decoded) < 2.0);
}

#[test]
fn lossy_dump_equals_decoder_output() {
    let sample = correlated_sample(16, 1200, 200);
    let opts = EncodeOptions { comp: 0.4, ..Default::default() };

    let mut archive = Vec::new();
    let mut dump = Vec::new();
    encode(&sample, &opts, &mut archive, Some(&mut dump)).unwrap();

    let mut decoded_text = Vec::new();
    decode(&archive[..], &mut decoded_text).unwrap();
    assert_eq!(dump, decoded_text);
}

#[test]
fn identical_runs_produce_identical_archives() {
    let sample = correlated_sample(12, 800, 300);
    let opts = EncodeOptions { comp: 0.7, clusters: 2, ..Default::default() };

    let mut first = Vec::new();
    let mut second = Vec::new();
    encode(&sample, &opts, &mut first, None).unwrap();
    encode(&sample, &opts, &mut second, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn lower_comp_spends_fewer_bytes() {
    let sample = iid_sample(16, 20, 1500, 400);

    let mut tight = Vec::new();
    let mut loose = Vec::new();
    encode(&sample, &EncodeOptions { comp: 0.1, ..Default::default() }, &mut tight, None)
        .unwrap();
    encode(&sample, &EncodeOptions { comp: 1.0, ..Default::default() }, &mut loose, None)
        .unwrap();
    assert!(tight.len() < loose.len());
}

#[test]
fn zero_comp_collapses_and_full_comp_is_nearly_lossless() {
    let sample = iid_sample(10, 8, 1000, 500);

    let mut collapsed = Vec::new();
    let report =
        encode(&sample, &EncodeOptions { comp: 0.0, ..Default::default() }, &mut collapsed, None)
            .unwrap();
    let decoded = decode_lines(&collapsed);
    // One state per quantizer: every line of a cluster decodes identically.
    assert!(decoded.iter().all(|line| line == &decoded[0]));
    assert!(report.measured_distortion > 0.0);

    // Full-rate coding of iid data bracketing the entropy keeps most
    // symbols intact.
    let mut full = Vec::new();
    encode(&sample, &EncodeOptions { comp: 1.0, ..Default::default() }, &mut full, None).unwrap();
    let decoded = decode_lines(&full);
    assert!(mean_l1(&sample, &decoded) < 1.0);
}

#[test]
fn measured_distortion_matches_design_expectation_on_iid_data() {
    let sample = iid_sample(12, 10, 4000, 600);
    let opts = EncodeOptions { comp: 0.5, ..Default::default() };

    let mut archive = Vec::new();
    let report = encode(&sample, &opts, &mut archive, None).unwrap();

    // On iid data the generator's model is exact, so the realized
    // distortion must sit near the design-time expectation. The slack
    // covers sampling noise and the stochastic lo/hi mixing.
    assert!(report.measured_distortion <= report.expected_distortion * 1.25 + 0.05);

    // And the report must agree with the distortion recomputed from the
    // decoder's output.
    let decoded = decode_lines(&archive);
    let mut total = 0.0;
    for (original, reconstructed) in sample.iter().zip(decoded.iter()) {
        for (&a, &b) in original.iter().zip(reconstructed.iter()) {
            let delta = f64::from(a) - f64::from(b);
            total += delta * delta;
        }
    }
    let recomputed = total / (sample.lines() as f64 * sample.columns() as f64);
    assert!((recomputed - report.measured_distortion).abs() < 1e-9);
}

#[test]
fn clustered_corpus_round_trips() {
    let alphabet = Alphabet::contiguous(ALPHABET);
    let mut sample = QualitySample::new(&alphabet, 10);
    let mut rng = SmallRng::seed_from_u64(700);
    let mut line = vec![0u8; 10];
    for i in 0..1000 {
        let base: i32 = if i < 500 { 8 } else { 32 };
        for slot in line.iter_mut() {
            *slot = (base + rng.gen_range(-2..=2)).clamp(0, 40) as u8;
        }
        sample.push_line(&line);
    }

    let opts = EncodeOptions {
        comp: 0.5,
        clusters: 2,
        metric: DistortionMetric::Manhattan,
        ..Default::default()
    };
    let mut archive = Vec::new();
    let report = encode(&sample, &opts, &mut archive, None).unwrap();
    assert_eq!(report.clusters, 2);

    let decoded = decode_lines(&archive);
    assert_eq!(decoded.len(), 1000);
    // The two halves live 24 quality steps apart; clustering keeps each
    // reconstruction in its own band.
    assert!(mean_l1(&sample, &decoded) < 2.0);
}

#[test]
fn training_cap_still_round_trips() {
    let sample = correlated_sample(12, 2000, 800);
    let opts = EncodeOptions { comp: 0.5, training_lines: 250, ..Default::default() };

    let mut archive = Vec::new();
    encode(&sample, &opts, &mut archive, None).unwrap();
    let decoded = decode_lines(&archive);
    assert_eq!(decoded.len(), 2000);
    assert!(mean_l1(&sample, &decoded) < 3.0);
}
