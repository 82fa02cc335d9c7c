// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// The following lints are allowed in all Quartz crates. Please see the
// workspace Cargo.toml for their justification.
#![allow(clippy::comparison_chain)]
#![allow(clippy::manual_range_contains)]

pub mod alphabet;
pub mod distortion;
pub mod errors;
pub mod io;
pub mod pmf;
pub mod quantizer;
pub mod rng;
pub mod sample;
