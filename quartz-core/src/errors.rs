// Quartz
// Copyright (c) 2026 The Project Quartz Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Quartz.
#[derive(Debug)]
pub enum Error {
    /// An IO error occurred while reading or writing a stream.
    IoError(io::Error),
    /// A codebook block contained malformed data and could not be parsed.
    MalformedCodebook(&'static str),
    /// The archive container was malformed or of an unsupported version.
    MalformedArchive(&'static str),
    /// A training input line violated the input contract.
    MalformedInput(&'static str),
    /// The training sample contained no lines.
    EmptyTraining,
    /// A column marginal was all zero after normalisation.
    DegenerateColumn(u32),
    /// A configuration parameter was outside its legal range.
    InvalidConfig(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => {
                write!(f, "io error: {}", err)
            }
            Error::MalformedCodebook(msg) => {
                write!(f, "malformed codebook: {}", msg)
            }
            Error::MalformedArchive(msg) => {
                write!(f, "malformed archive: {}", msg)
            }
            Error::MalformedInput(msg) => {
                write!(f, "malformed input: {}", msg)
            }
            Error::EmptyTraining => {
                write!(f, "training sample contains no lines")
            }
            Error::DegenerateColumn(column) => {
                write!(f, "column {} has an all-zero marginal", column)
            }
            Error::InvalidConfig(msg) => {
                write!(f, "invalid configuration: {}", msg)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a malformed codebook error.
pub fn malformed_codebook_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::MalformedCodebook(desc))
}

/// Convenience function to create a malformed archive error.
pub fn malformed_archive_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::MalformedArchive(desc))
}

/// Convenience function to create a malformed input error.
pub fn malformed_input_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::MalformedInput(desc))
}

/// Convenience function to create an empty training error.
pub fn empty_training_error<T>() -> Result<T> {
    Err(Error::EmptyTraining)
}

/// Convenience function to create a degenerate column error.
pub fn degenerate_column_error<T>(column: u32) -> Result<T> {
    Err(Error::DegenerateColumn(column))
}

/// Convenience function to create an invalid configuration error.
pub fn invalid_config_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidConfig(desc))
}
