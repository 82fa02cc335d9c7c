// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::process;
use std::time::Instant;

use clap::{App, Arg, ArgMatches};
use log::error;

use quartz_codec_qv::{decode, encode, EncodeOptions};
use quartz_core::alphabet::Alphabet;
use quartz_core::distortion::DistortionMetric;
use quartz_core::errors::{invalid_config_error, Result};
use quartz_core::sample::QualitySample;

/// Quality scores cover the Phred range 0..=40.
const QUALITY_ALPHABET_SIZE: usize = 41;

fn main() {
    pretty_env_logger::init();

    let matches = App::new("Quartz")
        .version(env!("CARGO_PKG_VERSION"))
        .author("The Project Quartz Developers")
        .about("Lossy quality value compressor")
        .arg(
            Arg::new("store")
                .short('q')
                .help("Store quality values in a compressed archive (default)")
                .conflicts_with("extract"),
        )
        .arg(Arg::new("extract").short('x').help("Extract quality values from an archive"))
        .arg(
            Arg::new("fraction")
                .short('f')
                .value_name("RATIO")
                .takes_value(true)
                .help("Compress using RATIO bits per bit of input entropy per symbol"),
        )
        .arg(
            Arg::new("rate")
                .short('r')
                .value_name("RATE")
                .takes_value(true)
                .help("Compress using a fixed RATE bits per symbol (not yet implemented)"),
        )
        .arg(
            Arg::new("distortion")
                .short('d')
                .value_name("M|L|A")
                .takes_value(true)
                .help("Optimize for MSE, log(1+L1), or L1 distortion (default: MSE)"),
        )
        .arg(
            Arg::new("clusters")
                .short('c')
                .value_name("N")
                .takes_value(true)
                .help("Compress using N clusters (default: 1)"),
        )
        .arg(
            Arg::new("threshold")
                .short('T')
                .value_name("N")
                .takes_value(true)
                .help("Cluster center movement threshold declaring a stable solution (default: 4)"),
        )
        .arg(
            Arg::new("training")
                .short('t')
                .value_name("LINES")
                .takes_value(true)
                .help("Number of lines to use as the training set (0 for all, default: 1000000)"),
        )
        .arg(
            Arg::new("uncompressed")
                .short('u')
                .value_name("FILE")
                .takes_value(true)
                .help("Write the uncompressed lossy values to FILE"),
        )
        .arg(Arg::new("stats").short('s').help("Print summary stats"))
        .arg(Arg::new("verbose").short('v').help("Enable verbose output"))
        .arg(Arg::new("INPUT").help("The input file path").required(true).index(1))
        .arg(Arg::new("OUTPUT").help("The output file path").required(true).index(2))
        .get_matches();

    let result = if matches.is_present("extract") {
        run_decode(&matches)
    }
    else {
        run_encode(&matches)
    };

    if let Err(err) = result {
        error!("{}", err);
        process::exit(1);
    }
}

fn parse_options(matches: &ArgMatches) -> Result<EncodeOptions> {
    let mut opts = EncodeOptions::default();

    if let Some(value) = matches.value_of("fraction") {
        opts.comp = match value.parse() {
            Ok(comp) => comp,
            Err(_) => return invalid_config_error("compression fraction is not a number"),
        };
    }
    else if let Some(value) = matches.value_of("rate") {
        eprintln!("warning: fixed rate encoding not yet implemented, falling back to ratio");
        opts.comp = match value.parse() {
            Ok(comp) => comp,
            Err(_) => return invalid_config_error("compression rate is not a number"),
        };
    }

    if let Some(value) = matches.value_of("distortion") {
        opts.metric = match value {
            "M" => DistortionMetric::Mse,
            "L" => DistortionMetric::Lorentz,
            "A" => DistortionMetric::Manhattan,
            _ => return invalid_config_error("unknown distortion metric"),
        };
    }

    if let Some(value) = matches.value_of("clusters") {
        opts.clusters = match value.parse() {
            Ok(count) => count,
            Err(_) => return invalid_config_error("cluster count is not a number"),
        };
    }

    if let Some(value) = matches.value_of("threshold") {
        opts.cluster_threshold = match value.parse() {
            Ok(threshold) => threshold,
            Err(_) => return invalid_config_error("cluster threshold is not a number"),
        };
    }

    if let Some(value) = matches.value_of("training") {
        opts.training_lines = match value.parse() {
            Ok(lines) => lines,
            Err(_) => return invalid_config_error("training line count is not a number"),
        };
    }

    Ok(opts)
}

fn run_encode(matches: &ArgMatches) -> Result<()> {
    let opts = parse_options(matches)?;
    let input_path = matches.value_of("INPUT").unwrap();
    let output_path = matches.value_of("OUTPUT").unwrap();
    let verbose = matches.is_present("verbose");

    let total_start = Instant::now();

    let alphabet = Alphabet::contiguous(QUALITY_ALPHABET_SIZE);
    let sample = QualitySample::from_reader(BufReader::new(File::open(input_path)?), &alphabet, 0)?;

    let output = BufWriter::new(File::create(output_path)?);
    let mut lossy_file = match matches.value_of("uncompressed") {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    let report = match lossy_file {
        Some(ref mut file) => encode(&sample, &opts, output, Some(file as &mut dyn Write))?,
        None => encode(&sample, &opts, output, None)?,
    };

    if let Some(mut file) = lossy_file {
        file.flush()?;
    }

    let total = total_start.elapsed().as_secs_f64();

    if verbose {
        println!("Clustering took {:.4} seconds", report.cluster_time.as_secs_f64());
        println!(
            "Stats and codebook generation took {:.4} seconds",
            report.codebook_time.as_secs_f64()
        );
        match opts.metric {
            DistortionMetric::Manhattan => {
                println!("L1 distortion: {}", report.measured_distortion)
            }
            DistortionMetric::Mse => println!("MSE distortion: {}", report.measured_distortion),
            DistortionMetric::Lorentz => {
                println!("log(1+L1) distortion: {}", report.measured_distortion)
            }
        }
        println!("Lines: {}", report.lines);
        println!("Columns: {}", report.columns);
        println!("Total bytes used: {}", report.bytes_written);
        println!("Encoding took {:.4} seconds.", report.coding_time.as_secs_f64());
        println!("Total time elapsed: {:.4} seconds.", total);
    }

    if matches.is_present("stats") {
        let symbols = report.lines as f64 * report.columns as f64;
        println!(
            "rate, {:.4}, distortion, {:.4}, time, {:.4}, size, {}",
            report.bytes_written as f64 * 8.0 / symbols,
            report.measured_distortion,
            total,
            report.bytes_written
        );
    }

    Ok(())
}

fn run_decode(matches: &ArgMatches) -> Result<()> {
    let input_path = matches.value_of("INPUT").unwrap();
    let output_path = matches.value_of("OUTPUT").unwrap();

    let start = Instant::now();
    let input = BufReader::new(File::open(input_path)?);
    let mut output = BufWriter::new(File::create(output_path)?);
    let report = decode(input, &mut output)?;
    output.flush()?;

    if matches.is_present("verbose") {
        println!("Decoded {} lines in {} seconds.", report.lines, start.elapsed().as_secs_f64());
    }

    Ok(())
}
