// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrrtReadError {
    #[error("GRRT file '{0}' doesn't exist")]
    BadFile(Box<Path>),

    #[error("{file}: line {line}: couldn't parse '{text}' as a number")]
    ParseFloat {
        file: Box<Path>,
        line: usize,
        text: String,
    },

    #[error("{file}: expected at least {expected} columns on line {line}, found {found}")]
    NotEnoughColumns {
        file: Box<Path>,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{file}: {rows} data rows do not form a square image grid")]
    NotSquare { file: Box<Path>, rows: usize },

    #[error("{file}: fewer than 3 header lines; is this really a BHOSS GRRT file?")]
    MissingBhossHeader { file: Box<Path> },

    #[error("{file}: BHOSS image resolution {m} doesn't match {rows} data rows")]
    BadBhossResolution {
        file: Box<Path>,
        m: usize,
        rows: usize,
    },

    #[error(
        "Frequency {freq:e} Hz is not in the GRRT file. Available frequencies [Hz]: {available:?}"
    )]
    FreqNotInFile { freq: f64, available: Vec<f64> },

    #[error("The source has no angular scale (µas per r_g) in the catalogue; can't scale a BHOSS image for it")]
    NoSourceScale,

    #[error(transparent)]
    SourceLookup(#[from] crate::sources::SourceLookupError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
