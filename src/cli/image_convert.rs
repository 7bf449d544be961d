// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Convert GRRT ASCII images to FITS model images.

use std::path::PathBuf;

use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{load_image, ImageInputFormat, ImageLoadArgs};
use super::ImfitError;
use crate::image::mjd_from_date;

const DEFAULT_AUTHOR: &str = "eht_imfit";

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
pub(super) struct ImageConvertArgs {
    /// Path to the GRRT ASCII image.
    #[clap(name = "INPUT", parse(from_os_str))]
    pub(super) input: PathBuf,

    /// The format of the input image.
    #[clap(arg_enum, short, long)]
    pub(super) format: ImageInputFormat,

    /// The source the image models (e.g. "SgrA*" or "M87"); sets the FITS
    /// position keys and, for BHOSS images, the angular scale.
    #[clap(short, long)]
    pub(super) source: String,

    /// The observing frequency [Hz]. For BHOSS images this selects the flux
    /// column and must be one of the frequencies in the file header.
    #[clap(long)]
    pub(super) freq: f64,

    /// The pixel size [microarcseconds]. Required for ipole images; BHOSS
    /// images carry their own scale.
    #[clap(long)]
    pub(super) pixel_size: Option<f64>,

    /// The (simulated) observation date, YYYY-MM-DD; sets the FITS MJD key.
    #[clap(long)]
    pub(super) date: String,

    /// The AUTHOR key written to the FITS header.
    #[clap(long)]
    pub(super) author: Option<String>,

    /// A HISTORY card for the FITS header.
    #[clap(long)]
    pub(super) history: Option<String>,

    /// Path to the output FITS image. Default: the input path with a .fits
    /// extension.
    #[clap(short, long, parse(from_os_str))]
    pub(super) output: Option<PathBuf>,

    /// Also plot the image to this PNG file.
    #[clap(long, parse(from_os_str))]
    pub(super) plot: Option<PathBuf>,

    /// Plot with a log10 colour scale.
    #[clap(long, requires = "plot")]
    #[serde(default)]
    pub(super) log_scale: bool,
}

impl ImageConvertArgs {
    pub(super) fn run(self, dry_run: bool) -> Result<(), ImfitError> {
        if matches!(self.format, ImageInputFormat::Fits) {
            return Err(ImageConvertArgsError::AlreadyFits.into());
        }
        let mjd = mjd_from_date(&self.date)?;
        let image = load_image(ImageLoadArgs {
            input: &self.input,
            format: self.format,
            source: Some(&self.source),
            freq: Some(self.freq),
            pixel_size: self.pixel_size,
            mjd,
        })?;

        if dry_run {
            info!("Dry run -- not writing anything.");
            return Ok(());
        }

        let output = self
            .output
            .unwrap_or_else(|| self.input.with_extension("fits"));
        image.write_fits(
            &output,
            self.author.as_deref().unwrap_or(DEFAULT_AUTHOR),
            self.history.as_deref(),
        )?;
        info!("Wrote FITS image to {}", output.display());

        if let Some(plot) = self.plot {
            plot_converted(&image, &plot, self.log_scale)?;
        }
        Ok(())
    }
}

#[cfg(feature = "plotting")]
fn plot_converted(
    image: &crate::image::ModelImage,
    output: &std::path::Path,
    log_scale: bool,
) -> Result<(), ImfitError> {
    crate::plot::plot_image(image, output, log_scale)?;
    info!("Wrote image plot to {}", output.display());
    Ok(())
}

#[cfg(not(feature = "plotting"))]
fn plot_converted(
    _: &crate::image::ModelImage,
    _: &std::path::Path,
    _: bool,
) -> Result<(), ImfitError> {
    Err(ImageConvertArgsError::NoPlottingFeature.into())
}

#[derive(Error, Debug)]
pub(super) enum ImageConvertArgsError {
    #[error("The input is already a FITS image; nothing to convert")]
    AlreadyFits,

    #[error("Can't plot; eht-imfit was not compiled with the \"plotting\" feature")]
    NoPlottingFeature,
}
