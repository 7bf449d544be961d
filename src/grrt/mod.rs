// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Readers for GRRT (general-relativistic radiative transfer) simulation
//! output. Two ASCII formats are supported: "ipole" (one row per pixel,
//! Stokes values in fixed columns) and "BHOSS" (three header lines followed
//! by one row per pixel with one flux column per simulated frequency).

mod error;
#[cfg(test)]
mod tests;

pub use error::GrrtReadError;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};
use ndarray::prelude::*;

use crate::constants::RAD_PER_UAS;

/// A GRRT image grid before any celestial metadata is attached: 4 Stokes
/// planes (I,Q,U,V) in Jy/pixel and the pixel scale.
#[derive(Debug, Clone)]
pub struct GrrtImage {
    /// Shape (4, dim, dim); planes I, Q, U, V. Codes that don't emit
    /// polarisation leave Q/U/V zeroed.
    pub stokes: Array3<f64>,

    /// Pixel size \[radians\].
    pub pixel_size: f64,
}

impl GrrtImage {
    /// The image dimension (pixels per side).
    pub fn dim(&self) -> usize {
        self.stokes.dim().1
    }

    /// Total Stokes I flux \[Jy\].
    pub fn total_flux(&self) -> f64 {
        self.stokes.index_axis(Axis(0), 0).sum()
    }
}

/// Read every whitespace-delimited row of numbers in a file, skipping
/// `skip_rows` leading lines.
fn load_txt(path: &Path, skip_rows: usize) -> Result<Vec<Vec<f64>>, GrrtReadError> {
    let file = BufReader::new(File::open(path)?);
    let mut rows = vec![];
    for (i_line, line) in file.lines().enumerate().skip(skip_rows) {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let row: Result<Vec<f64>, _> = trimmed.split_whitespace().map(str::parse).collect();
        match row {
            Ok(row) => rows.push(row),
            Err(_) => {
                return Err(GrrtReadError::ParseFloat {
                    file: path.to_path_buf().into_boxed_path(),
                    line: i_line + 1,
                    text: trimmed.to_string(),
                })
            }
        }
    }
    Ok(rows)
}

/// Read an ipole ASCII image.
///
/// Each row is one pixel. With 7 or more columns, columns 3..7 are the
/// polarised Stokes I,Q,U,V; otherwise column 2 is the unpolarised
/// intensity. The grid is stored column-major by ipole, so the reshaped
/// image is transposed. ipole gives no angular scale, so the pixel size
/// comes from the caller.
pub fn read_ipole(path: &Path, pixel_size_uas: f64) -> Result<GrrtImage, GrrtReadError> {
    if !path.exists() {
        return Err(GrrtReadError::BadFile(path.to_path_buf().into_boxed_path()));
    }
    let rows = load_txt(path, 0)?;
    let dim = (rows.len() as f64).sqrt().round() as usize;
    if dim * dim != rows.len() {
        return Err(GrrtReadError::NotSquare {
            file: path.to_path_buf().into_boxed_path(),
            rows: rows.len(),
        });
    }
    let num_cols = rows.first().map(|r| r.len()).unwrap_or(0);
    let polarised = num_cols >= 7;
    let min_cols = if polarised { 7 } else { 3 };
    debug!("ipole grid: {dim}x{dim} pixels, {num_cols} columns (polarised: {polarised})");

    let mut stokes = Array3::zeros((4, dim, dim));
    for (i_row, row) in rows.iter().enumerate() {
        if row.len() < min_cols {
            return Err(GrrtReadError::NotEnoughColumns {
                file: path.to_path_buf().into_boxed_path(),
                line: i_row + 1,
                expected: min_cols,
                found: row.len(),
            });
        }
        // The file runs along the y axis fastest; transpose as we fill.
        let (x, y) = (i_row / dim, i_row % dim);
        if polarised {
            for i_pol in 0..4 {
                stokes[(i_pol, y, x)] = row[3 + i_pol];
            }
        } else {
            stokes[(0, y, x)] = row[2];
        }
    }

    info!(
        "ipole image: total flux {:.3} Jy at {pixel_size_uas} µas/pixel",
        stokes.index_axis(Axis(0), 0).sum()
    );
    Ok(GrrtImage {
        stokes,
        pixel_size: pixel_size_uas * RAD_PER_UAS,
    })
}

/// The three BHOSS header lines.
#[derive(Debug, Clone)]
pub struct BhossHeader {
    /// Image half-width \[r_g\].
    pub width: f64,
    /// Offset of the grid from the origin \[r_g\].
    pub offset: f64,
    /// Pixels per side.
    pub resolution: usize,
    /// Observing time \[M\], inclination and azimuth \[degrees\], BH spin.
    pub time: f64,
    pub inclination: f64,
    pub phi: f64,
    pub spin: f64,
    /// Conversion of the luminosity F_nu to erg/Hz.
    pub lum_corr: f64,
    /// Conversion of the tabulated flux to Jy.
    pub jansky_corr: f64,
    /// The simulated observing frequencies \[Hz\].
    pub freqs: Vec<f64>,
}

/// Parse the three BHOSS header lines (based on Z. Younsi's layout).
pub fn read_bhoss_header(path: &Path) -> Result<BhossHeader, GrrtReadError> {
    if !path.exists() {
        return Err(GrrtReadError::BadFile(path.to_path_buf().into_boxed_path()));
    }
    let file = BufReader::new(File::open(path)?);
    let mut lines = file.lines();
    let mut next_row = |i_line: usize| -> Result<Vec<f64>, GrrtReadError> {
        let line = lines
            .next()
            .transpose()?
            .ok_or_else(|| GrrtReadError::MissingBhossHeader {
                file: path.to_path_buf().into_boxed_path(),
            })?;
        line.split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| GrrtReadError::ParseFloat {
                file: path.to_path_buf().into_boxed_path(),
                line: i_line,
                text: line.trim().to_string(),
            })
    };

    // First header line: [image width, offset, resolution, # of freqs].
    let h1 = next_row(1)?;
    // Second: [time, inclination, phi, spin, L corr., Jansky corr.].
    let h2 = next_row(2)?;
    // Third: the observing frequencies.
    let h3 = next_row(3)?;
    if h1.len() < 4 || h2.len() < 6 || h3.is_empty() {
        return Err(GrrtReadError::MissingBhossHeader {
            file: path.to_path_buf().into_boxed_path(),
        });
    }

    Ok(BhossHeader {
        width: h1[0],
        offset: h1[1],
        resolution: h1[2] as usize,
        time: h2[0],
        inclination: h2[1],
        phi: h2[2],
        spin: h2[3],
        lum_corr: h2[4],
        jansky_corr: h2[5],
        freqs: h3,
    })
}

/// Read a BHOSS ASCII image at the requested frequency.
///
/// `uas_per_rg` converts the image-plane coordinates from gravitational radii
/// to microarcseconds and depends on the source's mass and distance.
pub fn read_bhoss(path: &Path, freq_hz: f64, uas_per_rg: f64) -> Result<GrrtImage, GrrtReadError> {
    let header = read_bhoss_header(path)?;
    debug!("BHOSS header: {header:?}");

    // Find the requested frequency within the computed ones.
    let i_freq = header
        .freqs
        .iter()
        .position(|&f| (f - freq_hz).abs() <= 1e-6 * freq_hz)
        .ok_or_else(|| GrrtReadError::FreqNotInFile {
            freq: freq_hz,
            available: header.freqs.clone(),
        })?;
    // Data columns: pixel indices i and j, then one flux column per
    // frequency starting at column 3.
    let flux_col = 3 + i_freq;

    let m = header.resolution;
    let rows = load_txt(path, 3)?;
    if rows.len() != m * m {
        return Err(GrrtReadError::BadBhossResolution {
            file: path.to_path_buf().into_boxed_path(),
            m,
            rows: rows.len(),
        });
    }

    // Pixel coordinates in r_g on the image plane, then microarcseconds.
    let s1 = header.width + header.offset;
    let s2 = 2.0 * header.width / (m as f64 - 1.0);
    let mut stokes = Array3::zeros((4, m, m));
    let (mut xmin, mut xmax) = (f64::INFINITY, f64::NEG_INFINITY);
    for (i_row, row) in rows.iter().enumerate() {
        if row.len() <= flux_col {
            return Err(GrrtReadError::NotEnoughColumns {
                file: path.to_path_buf().into_boxed_path(),
                line: i_row + 4,
                expected: flux_col + 1,
                found: row.len(),
            });
        }
        let x = uas_per_rg * (-s1 + s2 * (row[0] - 1.0));
        xmin = xmin.min(x);
        xmax = xmax.max(x);
        let (i, j) = (i_row / m, i_row % m);
        stokes[(0, i, j)] = row[flux_col] * header.jansky_corr;
    }

    let dx_uas = (xmax - xmin) / m as f64;
    info!("BHOSS image resolution {dx_uas:.6} µas/pixel");
    info!(
        "Total flux {:.3} Jy, max pixel {:.3e} Jy",
        stokes.index_axis(Axis(0), 0).sum(),
        stokes
            .index_axis(Axis(0), 0)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    );

    Ok(GrrtImage {
        stokes,
        pixel_size: dx_uas * RAD_PER_UAS,
    })
}
