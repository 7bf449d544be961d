// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The model-image type that the converters produce and the fitting loop
//! consumes. Images are immutable; transformations return new images.

#[cfg(test)]
mod tests;

use std::path::Path;

use fitsio::images::{ImageDescription, ImageType};
use hifitime::Epoch;
use log::debug;
use ndarray::prelude::*;

use crate::{
    coord::RADec,
    grrt::GrrtImage,
    io::fits::{
        fits_create, fits_get_image, fits_get_optional_key, fits_get_required_key, fits_open,
        fits_open_hdu, fits_write_history, fits_write_image, fits_write_key, FitsError,
    },
    math::bilinear,
};

/// A model image of a source on the sky: four Stokes planes in Jy/pixel with
/// the celestial and spectral metadata needed to observe or export it.
#[derive(Debug, Clone)]
pub struct ModelImage {
    /// Shape (4, dim, dim); planes I, Q, U, V \[Jy/pixel\].
    pub stokes: Array3<f64>,

    /// Pixel size \[radians\].
    pub pixel_size: f64,

    /// The source name, as written to FITS `OBJECT` keys.
    pub source: String,

    /// J2000 position of the image centre.
    pub pos: RADec,

    /// Observing frequency \[Hz\].
    pub freq: f64,

    /// The modified Julian date of the (simulated) observation.
    pub mjd: f64,
}

impl ModelImage {
    /// Attach celestial metadata to a raw GRRT grid.
    pub fn from_grrt(
        grrt: GrrtImage,
        source: String,
        pos: RADec,
        freq: f64,
        mjd: f64,
    ) -> ModelImage {
        ModelImage {
            stokes: grrt.stokes,
            pixel_size: grrt.pixel_size,
            source,
            pos,
            freq,
            mjd,
        }
    }

    /// The image dimension (pixels per side).
    pub fn dim(&self) -> usize {
        self.stokes.dim().1
    }

    /// Total Stokes I flux \[Jy\].
    pub fn total_flux(&self) -> f64 {
        self.stokes.index_axis(Axis(0), 0).sum()
    }

    /// A copy rescaled so that the total Stokes I flux is `flux_jy`. All four
    /// Stokes planes are scaled by the same factor.
    pub fn scaled_to_flux(&self, flux_jy: f64) -> ModelImage {
        let total = self.total_flux();
        let factor = if total.abs() > 0.0 {
            flux_jy / total
        } else {
            0.0
        };
        let mut new = self.clone();
        new.stokes *= factor;
        new
    }

    /// A copy rotated about the image centre by a position angle \[degrees\].
    /// Each plane is resampled bilinearly; pixels that fall off the grid are
    /// zero (blank sky).
    pub fn rotated(&self, pa_deg: f64) -> ModelImage {
        let (sin, cos) = pa_deg.to_radians().sin_cos();
        let dim = self.dim();
        let centre = (dim as f64 - 1.0) / 2.0;
        let mut stokes = Array3::zeros(self.stokes.raw_dim());
        for i_pol in 0..4 {
            let plane = self.stokes.index_axis(Axis(0), i_pol);
            let mut rotated = stokes.index_axis_mut(Axis(0), i_pol);
            for r in 0..dim {
                let dr = r as f64 - centre;
                for c in 0..dim {
                    let dc = c as f64 - centre;
                    // Inverse mapping: find where this output pixel came from.
                    let src_c = centre + cos * dc + sin * dr;
                    let src_r = centre - sin * dc + cos * dr;
                    rotated[(r, c)] = bilinear(plane, src_c, src_r);
                }
            }
        }
        let mut new = self.clone();
        new.stokes = stokes;
        new
    }

    /// Write the Stokes I plane as a FITS image with the standard VLBI header
    /// keys.
    pub fn write_fits(
        &self,
        path: &Path,
        author: &str,
        history: Option<&str>,
    ) -> Result<(), FitsError> {
        let dim = self.dim();
        let description = ImageDescription {
            data_type: ImageType::Double,
            dimensions: &[dim, dim],
        };
        let mut fptr = fits_create(path, &description)?;
        let hdu = fits_open_hdu(&mut fptr, 0)?;

        let cdelt_deg = self.pixel_size.to_degrees();
        fits_write_key(&mut fptr, &hdu, "AUTHOR", author)?;
        fits_write_key(&mut fptr, &hdu, "OBJECT", self.source.as_str())?;
        fits_write_key(&mut fptr, &hdu, "CTYPE1", "RA---SIN")?;
        fits_write_key(&mut fptr, &hdu, "CTYPE2", "DEC--SIN")?;
        // RA increases to the east, i.e. to the left.
        fits_write_key(&mut fptr, &hdu, "CDELT1", -cdelt_deg)?;
        fits_write_key(&mut fptr, &hdu, "CDELT2", cdelt_deg)?;
        fits_write_key(&mut fptr, &hdu, "OBSRA", self.pos.ra_degrees())?;
        fits_write_key(&mut fptr, &hdu, "OBSDEC", self.pos.dec_degrees())?;
        fits_write_key(&mut fptr, &hdu, "FREQ", self.freq)?;
        fits_write_key(&mut fptr, &hdu, "MJD", self.mjd)?;
        fits_write_key(&mut fptr, &hdu, "TELESCOP", "VLBI")?;
        fits_write_key(&mut fptr, &hdu, "BUNIT", "JY/PIXEL")?;
        fits_write_key(&mut fptr, &hdu, "STOKES", "I")?;
        if let Some(history) = history {
            fits_write_history(&mut fptr, &hdu, history)?;
        }

        let i_plane: Vec<f64> = self
            .stokes
            .index_axis(Axis(0), 0)
            .iter()
            .copied()
            .collect();
        fits_write_image(&mut fptr, &hdu, &i_plane)?;
        debug!("Wrote {dim}x{dim} model image to {}", path.display());
        Ok(())
    }

    /// Read a model image previously written by [`ModelImage::write_fits`]
    /// (or any single-plane VLBI FITS image with compatible keys). Q, U and V
    /// are zeroed.
    pub fn read_fits(path: &Path) -> Result<ModelImage, FitsError> {
        let mut fptr = fits_open(path)?;
        let hdu = fits_open_hdu(&mut fptr, 0)?;

        let source: String =
            fits_get_optional_key(&mut fptr, &hdu, "OBJECT")?.unwrap_or_else(|| "unknown".into());
        let cdelt2: f64 = fits_get_required_key(&mut fptr, &hdu, "CDELT2")?;
        let obsra: f64 = fits_get_required_key(&mut fptr, &hdu, "OBSRA")?;
        let obsdec: f64 = fits_get_required_key(&mut fptr, &hdu, "OBSDEC")?;
        let freq: f64 = fits_get_required_key(&mut fptr, &hdu, "FREQ")?;
        let mjd: f64 = fits_get_optional_key(&mut fptr, &hdu, "MJD")?.unwrap_or(0.0);

        let flat: Vec<f64> = fits_get_image(&mut fptr, &hdu)?;
        let dim = (flat.len() as f64).sqrt().round() as usize;
        if dim * dim != flat.len() {
            return Err(FitsError::NotImage {
                fits_filename: path.into(),
                hdu_num: 0,
                source_file: file!(),
                source_line: line!(),
                source_column: column!(),
            });
        }
        let mut stokes = Array3::zeros((4, dim, dim));
        stokes
            .index_axis_mut(Axis(0), 0)
            .assign(&Array2::from_shape_vec((dim, dim), flat).expect("dims agree by construction"));

        Ok(ModelImage {
            stokes,
            pixel_size: cdelt2.to_radians(),
            source,
            pos: RADec::from_degrees(obsra, obsdec),
            freq,
            mjd,
        })
    }
}

/// The MJD for midnight UTC of a "YYYY-MM-DD" calendar date.
pub fn mjd_from_date(date: &str) -> Result<f64, hifitime::Errors> {
    let epoch = Epoch::from_gregorian_str(&format!("{date}T00:00:00 UTC"))?;
    Ok(epoch.to_mjd_utc_days())
}
