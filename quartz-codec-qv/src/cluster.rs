// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `cluster` module partitions the corpus into sub-corpora by k-means
//! over whole lines, so each cluster gets its own codebook family.
//!
//! Everything here is deterministic: centers start on evenly spaced lines,
//! ties go to the lower cluster id, and an emptied cluster is reseeded from
//! the line farthest from its assigned center. Determinism matters because
//! identical runs must produce byte-identical archives.

use log::debug;

use quartz_core::errors::{invalid_config_error, Result};
use quartz_core::sample::QualitySample;

/// Upper bound on Lloyd iterations; the movement threshold usually stops
/// the loop much earlier.
const MAX_ROUNDS: usize = 64;

/// A k-means partition of the corpus.
pub struct ClusterSet {
    count: usize,
    assignments: Vec<u16>,
}

impl ClusterSet {
    /// The number of clusters.
    pub fn count(&self) -> usize {
        self.count
    }

    /// The cluster id of every line, in input order.
    pub fn assignments(&self) -> &[u16] {
        &self.assignments
    }

    /// The number of lines assigned to the given cluster.
    pub fn population(&self, cluster: usize) -> u64 {
        self.assignments.iter().filter(|&&c| usize::from(c) == cluster).count() as u64
    }
}

fn squared_distance(line: &[u8], center: &[f64]) -> f64 {
    line.iter()
        .zip(center.iter())
        .map(|(&sym, &c)| {
            let delta = f64::from(sym) - c;
            delta * delta
        })
        .sum()
}

fn nearest(line: &[u8], centers: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (cluster, center) in centers.iter().enumerate() {
        let distance = squared_distance(line, center);
        if distance < best_distance {
            best_distance = distance;
            best = cluster;
        }
    }
    best
}

/// Partitions the sample into `count` clusters, iterating until no center
/// moves farther than `threshold` (L2 norm) or the round limit is hit.
pub fn kmeans(sample: &QualitySample, count: usize, threshold: f64) -> Result<ClusterSet> {
    if count == 0 {
        return invalid_config_error("cluster count must be at least 1");
    }
    if count > u16::MAX as usize {
        return invalid_config_error("cluster count exceeds the archive limit");
    }
    if threshold <= 0.0 {
        return invalid_config_error("cluster movement threshold must be positive");
    }

    let lines = sample.lines();
    if (count as u64) > lines {
        return invalid_config_error("more clusters than lines");
    }

    if count == 1 {
        return Ok(ClusterSet { count, assignments: vec![0; lines as usize] });
    }

    let columns = sample.columns();

    // Evenly spaced seeding keeps runs reproducible without a PRNG.
    let mut centers: Vec<Vec<f64>> = (0..count)
        .map(|c| {
            let line = sample.line(c as u64 * lines / count as u64);
            line.iter().map(|&s| f64::from(s)).collect()
        })
        .collect();

    let mut assignments = vec![0u16; lines as usize];

    for round in 0..MAX_ROUNDS {
        for (index, line) in sample.iter().enumerate() {
            assignments[index] = nearest(line, &centers) as u16;
        }

        let mut sums = vec![vec![0.0; columns]; count];
        let mut populations = vec![0u64; count];
        for (index, line) in sample.iter().enumerate() {
            let cluster = usize::from(assignments[index]);
            populations[cluster] += 1;
            for (slot, &sym) in sums[cluster].iter_mut().zip(line.iter()) {
                *slot += f64::from(sym);
            }
        }

        let mut movement: f64 = 0.0;
        for cluster in 0..count {
            if populations[cluster] == 0 {
                // Reseed a dead cluster from the worst-represented line.
                let mut farthest = 0u64;
                let mut farthest_distance = -1.0;
                for (index, line) in sample.iter().enumerate() {
                    let assigned = usize::from(assignments[index]);
                    let distance = squared_distance(line, &centers[assigned]);
                    if distance > farthest_distance {
                        farthest_distance = distance;
                        farthest = index as u64;
                    }
                }
                centers[cluster] =
                    sample.line(farthest).iter().map(|&s| f64::from(s)).collect();
                movement = f64::INFINITY;
                continue;
            }

            let mut shift = 0.0;
            for (column, slot) in centers[cluster].iter_mut().enumerate() {
                let mean = sums[cluster][column] / populations[cluster] as f64;
                let delta = mean - *slot;
                shift += delta * delta;
                *slot = mean;
            }
            movement = movement.max(shift.sqrt());
        }

        debug!("k-means round {}: max center movement {:.3}", round, movement);
        if movement <= threshold {
            break;
        }
    }

    // Final assignment against the settled centers.
    for (index, line) in sample.iter().enumerate() {
        assignments[index] = nearest(line, &centers) as u16;
    }

    // Every cluster must own at least one line, or its codebook would have
    // no training data. Hand an emptied cluster the line that fits its own
    // cluster worst, taken from a donor that can spare one.
    let mut populations = vec![0u64; count];
    for &cluster in assignments.iter() {
        populations[usize::from(cluster)] += 1;
    }
    for cluster in 0..count {
        while populations[cluster] == 0 {
            let mut farthest = None;
            let mut farthest_distance = -1.0;
            for (index, line) in sample.iter().enumerate() {
                let assigned = usize::from(assignments[index]);
                if populations[assigned] < 2 {
                    continue;
                }
                let distance = squared_distance(line, &centers[assigned]);
                if distance > farthest_distance {
                    farthest_distance = distance;
                    farthest = Some(index);
                }
            }
            match farthest {
                Some(index) => {
                    populations[usize::from(assignments[index])] -= 1;
                    assignments[index] = cluster as u16;
                    populations[cluster] += 1;
                }
                None => break,
            }
        }
    }

    Ok(ClusterSet { count, assignments })
}

#[cfg(test)]
mod tests {
    use super::kmeans;
    use quartz_core::alphabet::Alphabet;
    use quartz_core::errors::Error;
    use quartz_core::sample::QualitySample;

    fn sample_from(lines: &[&[u8]]) -> QualitySample {
        let alphabet = Alphabet::contiguous(41);
        let mut sample = QualitySample::new(&alphabet, lines[0].len());
        for line in lines {
            sample.push_line(line);
        }
        sample
    }

    #[test]
    fn verify_single_cluster_is_trivial() {
        let sample = sample_from(&[&[1, 2], &[3, 4], &[5, 6]]);
        let clusters = kmeans(&sample, 1, 4.0).unwrap();
        assert_eq!(clusters.count(), 1);
        assert!(clusters.assignments().iter().all(|&c| c == 0));
    }

    #[test]
    fn verify_separated_blobs_split_cleanly() {
        let mut lines: Vec<Vec<u8>> = Vec::new();
        for i in 0..20u8 {
            lines.push(vec![2 + i % 2, 3, 2]);
        }
        for i in 0..20u8 {
            lines.push(vec![36 + i % 2, 35, 38]);
        }
        let refs: Vec<&[u8]> = lines.iter().map(|l| l.as_slice()).collect();
        let sample = sample_from(&refs);

        let clusters = kmeans(&sample, 2, 1.0).unwrap();
        let ids = clusters.assignments();
        // Each blob ends up in one cluster, whichever blob got id 0.
        assert!(ids[..20].iter().all(|&c| c == ids[0]));
        assert!(ids[20..].iter().all(|&c| c == ids[20]));
        assert_ne!(ids[0], ids[20]);
        assert_eq!(clusters.population(0), 20);
        assert_eq!(clusters.population(1), 20);

        // Identical input must produce identical assignments.
        let again = kmeans(&sample, 2, 1.0).unwrap();
        assert_eq!(clusters.assignments(), again.assignments());
    }

    #[test]
    fn verify_bad_configs_are_rejected() {
        let sample = sample_from(&[&[1, 2], &[3, 4]]);
        assert!(matches!(kmeans(&sample, 0, 4.0), Err(Error::InvalidConfig(_))));
        assert!(matches!(kmeans(&sample, 3, 4.0), Err(Error::InvalidConfig(_))));
        assert!(matches!(kmeans(&sample, 1, 0.0), Err(Error::InvalidConfig(_))));
    }
}
