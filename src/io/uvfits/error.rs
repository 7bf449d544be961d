// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UvfitsReadError {
    #[error("{file} is not a random-groups UV-FITS file (GROUPS is not T)")]
    NotRandomGroups { file: Box<Path> },

    #[error("{file}: no group parameter PTYPE matching '{param}'")]
    MissingGroupParam { file: Box<Path>, param: &'static str },

    #[error("{file}: expected the COMPLEX axis (NAXIS2) to have 3 elements, found {found}")]
    BadComplexAxis { file: Box<Path>, found: usize },

    #[error(
        "{file}: expected 4 correlation products on the STOKES axis (RR, LL, RL, LR), found {found}"
    )]
    BadStokesAxis { file: Box<Path>, found: usize },

    #[error("{file}: no AIPS AN antenna table")]
    MissingAntennaTable { file: Box<Path> },

    #[error("{file}: baseline param references antenna number {nosta}, which is not in the AIPS AN table")]
    UnknownAntenna { file: Box<Path>, nosta: usize },

    #[error("{file}: every visibility was flagged or NaN; nothing to fit against")]
    NoVisibilities { file: Box<Path> },

    /// An error associated with fits files.
    #[error(transparent)]
    Fits(#[from] crate::io::fits::FitsError),
}
