// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code shared between the subcommands.

use std::path::Path;
use std::str::FromStr;

use clap::ArgEnum;
use log::info;
use serde::{Deserialize, Serialize};

use super::ImfitError;
use crate::{
    grrt::{read_bhoss, read_ipole},
    image::ModelImage,
    sources,
};

pub(super) const ARG_FILE_HELP: &str = "All of the arguments may be specified in a toml or json file. Any CLI arguments override parameters set in the file.";

/// The model-image input formats the subcommands accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ArgEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum ImageInputFormat {
    /// ipole ASCII output (one row per pixel).
    Ipole,

    /// BHOSS ASCII output (three header lines, one flux column per
    /// frequency).
    Bhoss,

    /// A FITS model image, e.g. one written by image-convert.
    Fits,
}

/// File types that can be used as argument files.
pub(super) enum ArgFileTypes {
    Toml,
    Json,
}

impl FromStr for ArgFileTypes {
    type Err = ();

    fn from_str(s: &str) -> Result<ArgFileTypes, ()> {
        match s {
            "toml" => Ok(ArgFileTypes::Toml),
            "json" => Ok(ArgFileTypes::Json),
            _ => Err(()),
        }
    }
}

// Read an argument struct out of a toml or json file. This has to be a macro
// because the struct type differs per subcommand.
macro_rules! unpack_arg_file {
    ($arg_file:expr) => {{
        use std::{fs::File, io::Read, str::FromStr};

        use crate::cli::common::ArgFileTypes;

        debug!("Attempting to parse argument file {}", $arg_file.display());

        let mut contents = String::new();
        let arg_file_type = $arg_file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArgFileTypes::from_str(&e).ok());

        match arg_file_type {
            Some(ArgFileTypes::Toml) => {
                debug!("Parsing toml file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match toml::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(ImfitError::ArgFile(format!(
                            "Couldn't decode toml structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            Some(ArgFileTypes::Json) => {
                debug!("Parsing json file...");
                let mut fh = File::open(&$arg_file)?;
                fh.read_to_string(&mut contents)?;
                match serde_json::from_str(&contents) {
                    Ok(p) => p,
                    Err(err) => {
                        return Err(ImfitError::ArgFile(format!(
                            "Couldn't decode json structure from {:?}:\n{err}",
                            $arg_file
                        )))
                    }
                }
            }
            None => {
                return Err(ImfitError::ArgFile(format!(
                    "Argument file {:?} doesn't have a recognised file extension (toml or json)",
                    $arg_file
                )))
            }
        }
    }};
}

/// What a subcommand needs to turn its image arguments into a `ModelImage`.
pub(super) struct ImageLoadArgs<'a> {
    pub(super) input: &'a Path,
    pub(super) format: ImageInputFormat,
    pub(super) source: Option<&'a str>,
    pub(super) freq: Option<f64>,
    pub(super) pixel_size: Option<f64>,
    pub(super) mjd: f64,
}

/// Load a model image from any of the supported formats, attaching catalogue
/// metadata for the ASCII formats.
pub(super) fn load_image(args: ImageLoadArgs) -> Result<ModelImage, ImfitError> {
    let image = match args.format {
        ImageInputFormat::Fits => {
            let image = ModelImage::read_fits(args.input)?;
            info!(
                "Read {0}x{0} FITS model image of {1}",
                image.dim(),
                image.source
            );
            return Ok(image);
        }

        ImageInputFormat::Ipole => {
            let source = required(args.source, "--source")?;
            let freq = required(args.freq, "--freq")?;
            let pixel_size = required(args.pixel_size, "--pixel-size")?;
            let source = sources::lookup(source)?;
            let grrt = read_ipole(args.input, pixel_size)?;
            ModelImage::from_grrt(grrt, source.name.to_string(), source.pos, freq, args.mjd)
        }

        ImageInputFormat::Bhoss => {
            let source = required(args.source, "--source")?;
            let freq = required(args.freq, "--freq")?;
            let source = sources::lookup(source)?;
            let uas_per_rg = source
                .uas_per_rg
                .ok_or(crate::grrt::GrrtReadError::NoSourceScale)?;
            let grrt = read_bhoss(args.input, freq, uas_per_rg)?;
            ModelImage::from_grrt(grrt, source.name.to_string(), source.pos, freq, args.mjd)
        }
    };
    info!(
        "Loaded {0}x{0} image of {1}: {2:.3} Jy total",
        image.dim(),
        image.source,
        image.total_flux()
    );
    Ok(image)
}

fn required<T>(value: Option<T>, what: &str) -> Result<T, ImfitError> {
    value.ok_or_else(|| ImfitError::Image(format!("{what} is required for this image format")))
}
