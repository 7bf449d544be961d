// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Plot a FITS model image. Only available if compiled with the "plotting"
//! feature.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use super::ImfitError;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
pub(super) struct ImagePlotArgs {
    /// Path to the FITS model image.
    #[clap(name = "FITS_IMAGE", parse(from_os_str))]
    pub(super) input: PathBuf,

    /// Path to the output PNG. Default: the input path with a .png extension.
    #[clap(short, long, parse(from_os_str))]
    pub(super) output: Option<PathBuf>,

    /// Plot with a log10 colour scale.
    #[clap(long)]
    #[serde(default)]
    pub(super) log_scale: bool,
}

impl ImagePlotArgs {
    #[cfg(feature = "plotting")]
    pub(super) fn run(self, dry_run: bool) -> Result<(), ImfitError> {
        use log::info;

        let image = crate::image::ModelImage::read_fits(&self.input)?;
        if dry_run {
            info!("Dry run -- not writing anything.");
            return Ok(());
        }
        let output = self
            .output
            .unwrap_or_else(|| self.input.with_extension("png"));
        crate::plot::plot_image(&image, &output, self.log_scale)?;
        info!("Wrote image plot to {}", output.display());
        Ok(())
    }

    #[cfg(not(feature = "plotting"))]
    pub(super) fn run(self, _dry_run: bool) -> Result<(), ImfitError> {
        Err(ImfitError::Plotting(
            "Can't plot; eht-imfit was not compiled with the \"plotting\" feature".to_string(),
        ))
    }
}
