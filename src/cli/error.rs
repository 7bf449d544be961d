// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all eht_imfit-related errors. This should be the *only*
//! error enum that is publicly visible.

use thiserror::Error;

use super::{
    fit::FitArgsError, image_convert::ImageConvertArgsError, simulate::SimulateArgsError,
};
use crate::{
    grrt::GrrtReadError, io::fits::FitsError, io::uvfits::UvfitsReadError,
    sources::SourceLookupError,
};

/// The *only* publicly visible error from eht_imfit.
#[derive(Error, Debug)]
pub enum ImfitError {
    /// An error related to converting or reading model images.
    #[error("{0}")]
    Image(String),

    /// An error related to reading visibility data.
    #[error("{0}")]
    VisRead(String),

    /// An error related to the fit subcommand.
    #[error("{0}")]
    Fit(String),

    /// An error related to the simulate subcommand.
    #[error("{0}")]
    Simulate(String),

    /// An error related to plotting.
    #[error("{0}")]
    Plotting(String),

    /// An error related to argument files.
    #[error("{0}")]
    ArgFile(String),

    /// A cfitsio error. Because these are usually quite spartan, some
    /// suggestions are provided here.
    #[error("cfitsio error: {0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv).")]
    Cfitsio(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// Binary sub-command errors.

impl From<ImageConvertArgsError> for ImfitError {
    fn from(e: ImageConvertArgsError) -> Self {
        Self::Image(e.to_string())
    }
}

impl From<FitArgsError> for ImfitError {
    fn from(e: FitArgsError) -> Self {
        Self::Fit(e.to_string())
    }
}

impl From<SimulateArgsError> for ImfitError {
    fn from(e: SimulateArgsError) -> Self {
        Self::Simulate(e.to_string())
    }
}

// Library code errors.

impl From<GrrtReadError> for ImfitError {
    fn from(e: GrrtReadError) -> Self {
        match e {
            GrrtReadError::IO(e) => Self::from(e),
            _ => Self::Image(e.to_string()),
        }
    }
}

impl From<SourceLookupError> for ImfitError {
    fn from(e: SourceLookupError) -> Self {
        Self::Image(e.to_string())
    }
}

impl From<UvfitsReadError> for ImfitError {
    fn from(e: UvfitsReadError) -> Self {
        match e {
            UvfitsReadError::Fits(e) => Self::from(e),
            _ => Self::VisRead(e.to_string()),
        }
    }
}

impl From<FitsError> for ImfitError {
    fn from(e: FitsError) -> Self {
        Self::Cfitsio(e.to_string())
    }
}

#[cfg(feature = "plotting")]
impl From<crate::plot::PlotError> for ImfitError {
    fn from(e: crate::plot::PlotError) -> Self {
        Self::Plotting(e.to_string())
    }
}

impl From<hifitime::Errors> for ImfitError {
    fn from(e: hifitime::Errors) -> Self {
        Self::Generic(format!("Couldn't parse the date: {e}"))
    }
}

impl From<serde_json::Error> for ImfitError {
    fn from(e: serde_json::Error) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<std::io::Error> for ImfitError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
