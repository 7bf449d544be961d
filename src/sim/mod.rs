// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthetic observations of model images: a direct Fourier transform at the
//! data's uv samples, then the corruptions a real VLBI array applies (thermal
//! noise, station gain errors, polarization leakage).


use ndarray::prelude::*;
use num_complex::Complex64;
use rand::{rngs::StdRng, Rng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::{
    constants::{eht2017_station, DTERMP_DEFAULT, GAINP_DEFAULT, PI, QUANT_EFFICIENCY, TAU},
    image::ModelImage,
    math::cexp,
    obs::{Obsdata, Visibility},
};

/// Which corruptions to apply on top of the noiseless visibilities.
#[derive(Debug, Clone, Copy)]
pub struct SimOptions {
    /// Scale on the station SEFDs used for thermal noise. Zero means "use
    /// the data's own per-sample sigmas" instead of an SEFD noise model.
    pub sefd_factor: f64,

    /// Apply per-station, per-scan amplitude gain errors.
    pub gain_errors: bool,

    /// Apply per-station, per-scan phase errors (uncalibrated phases).
    pub phase_errors: bool,

    /// Apply per-station polarization leakage (D-terms).
    pub leakage: bool,
}

impl Default for SimOptions {
    fn default() -> SimOptions {
        SimOptions {
            sefd_factor: 0.0,
            gain_errors: true,
            phase_errors: false,
            leakage: true,
        }
    }
}

/// A pixel with any flux in it, flattened out of the image grid.
struct SkyPixel {
    l: f64,
    m: f64,
    i: f64,
    q: f64,
    u: f64,
}

/// The ideal (noiseless, uncorrupted) observation of a model image at the uv
/// samples of an existing observation. The phase centre is the image centre.
pub fn observe_nonoise(image: &ModelImage, obs: &Obsdata) -> Obsdata {
    let dim = image.dim();
    let centre = (dim as f64 - 1.0) / 2.0;
    let i_plane = image.stokes.index_axis(Axis(0), 0);
    let q_plane = image.stokes.index_axis(Axis(0), 1);
    let u_plane = image.stokes.index_axis(Axis(0), 2);

    // Flatten the image to its non-empty pixels; GRRT images are mostly
    // dark sky and the DFT cost is per pixel per sample.
    let mut pixels = vec![];
    for r in 0..dim {
        for c in 0..dim {
            let (i, q, u) = (i_plane[(r, c)], q_plane[(r, c)], u_plane[(r, c)]);
            if i != 0.0 || q != 0.0 || u != 0.0 {
                pixels.push(SkyPixel {
                    // RA increases to the east (decreasing column); the first
                    // row is north.
                    l: (centre - c as f64) * image.pixel_size,
                    m: (centre - r as f64) * image.pixel_size,
                    i,
                    q,
                    u,
                });
            }
        }
    }

    let vis = obs
        .vis
        .par_iter()
        .map(|data_vis| {
            let mut i = Complex64::new(0.0, 0.0);
            let mut q = Complex64::new(0.0, 0.0);
            let mut u = Complex64::new(0.0, 0.0);
            for p in &pixels {
                let phase = cexp(-TAU * (data_vis.uu * p.l + data_vis.vv * p.m));
                i += p.i * phase;
                q += p.q * phase;
                u += p.u * phase;
            }
            Visibility {
                i,
                q,
                u,
                sigma: 0.0,
                ..*data_vis
            }
        })
        .collect();

    Obsdata {
        vis,
        ..obs.clone()
    }
}

/// Thermal noise on a baseline \[Jy\] for 2-bit sampled data.
pub fn thermal_sigma(sefd1: f64, sefd2: f64, bandwidth: f64, t_int: f64) -> f64 {
    (sefd1 * sefd2 / (2.0 * bandwidth * t_int)).sqrt() / QUANT_EFFICIENCY
}

/// One noisy realisation: corrupt a noiseless observation the way the array
/// would. `scans` drives the per-scan gain and phase draws; `data` supplies
/// the per-sample sigmas used when `sefd_factor` is zero.
pub fn observe(
    perfect: &Obsdata,
    data: &Obsdata,
    scans: &[(f64, f64)],
    opts: SimOptions,
    rng: &mut StdRng,
) -> Obsdata {
    let num_stations = perfect.stations.len();
    let gain_jitter = Normal::new(0.0, 1.0).expect("unit normal is valid");
    let dterm = Normal::new(0.0, DTERMP_DEFAULT).expect("positive sigma");

    // Station D-terms are fixed for the whole observation.
    let mut d_r = vec![Complex64::new(0.0, 0.0); num_stations];
    let mut d_l = vec![Complex64::new(0.0, 0.0); num_stations];
    if opts.leakage {
        for i in 0..num_stations {
            d_r[i] = Complex64::new(dterm.sample(rng), dterm.sample(rng));
            d_l[i] = Complex64::new(dterm.sample(rng), dterm.sample(rng));
        }
    }

    // Per-scan, per-station gains and phases. Draw these for every scan and
    // station, in a fixed order, so a seed always produces the same
    // corruption regardless of which baselines are present.
    let mut gains = Array2::ones((scans.len(), num_stations));
    let mut phases = Array2::zeros((scans.len(), num_stations));
    for i_scan in 0..scans.len() {
        for i_stn in 0..num_stations {
            let (_, offset, jitter) = station_params(perfect, i_stn);
            if opts.gain_errors {
                let g: f64 = (1.0 + offset) * (1.0 + jitter * gain_jitter.sample(rng));
                gains[(i_scan, i_stn)] = g.max(0.0);
            }
            if opts.phase_errors {
                phases[(i_scan, i_stn)] = rng.gen_range(-PI..PI);
            }
        }
    }

    let t_int = typical_integration(data);
    let vis = perfect
        .vis
        .iter()
        .zip(data.vis.iter())
        .map(|(v, data_vis)| {
            let i_scan = scans
                .iter()
                .position(|&(start, end)| v.time >= start && v.time <= end)
                .unwrap_or(0);

            // Leakage first: first-order D-term mixing of the parallel hands
            // into the cross hands (RR ~ LL ~ I for these sources).
            let (mut i, mut q, mut u) = (v.i, v.q, v.u);
            if opts.leakage {
                let rl = q + Complex64::i() * u
                    + (d_r[v.ant1] + d_l[v.ant2].conj()) * i;
                let lr = q - Complex64::i() * u
                    + (d_l[v.ant1] + d_r[v.ant2].conj()) * i;
                q = (rl + lr) / 2.0;
                u = (rl - lr) / Complex64::new(0.0, 2.0);
            }

            // Station gains and phases.
            let amp = (gains[(i_scan, v.ant1)] * gains[(i_scan, v.ant2)]).sqrt();
            let phase = cexp(phases[(i_scan, v.ant1)] - phases[(i_scan, v.ant2)]);
            let g = amp * phase;
            i *= g;
            q *= g;
            u *= g;

            // Thermal noise.
            let sigma = if opts.sefd_factor > 0.0 {
                let (sefd1, _, _) = station_params(perfect, v.ant1);
                let (sefd2, _, _) = station_params(perfect, v.ant2);
                opts.sefd_factor * thermal_sigma(sefd1, sefd2, perfect.bandwidth, t_int)
            } else {
                data_vis.sigma
            };
            let mut noise = || Complex64::new(sigma * gain_jitter.sample(rng), sigma * gain_jitter.sample(rng));
            Visibility {
                i: i + noise(),
                q: q + noise(),
                u: u + noise(),
                sigma,
                ..*v
            }
        })
        .collect();

    Obsdata {
        vis,
        ..perfect.clone()
    }
}

/// (SEFD, gain offset, gain jitter) for a station, with conservative defaults
/// for sites outside the built-in table.
fn station_params(obs: &Obsdata, i_stn: usize) -> (f64, f64, f64) {
    let station = &obs.stations[i_stn];
    match eht2017_station(&station.name) {
        Some((_, offset, jitter)) => (station.sefd, offset, jitter),
        None => (station.sefd, 0.0, GAINP_DEFAULT),
    }
}

/// A representative integration time \[seconds\]: the median gap between
/// consecutive timestamps, falling back to 10 s for single-integration data.
fn typical_integration(obs: &Obsdata) -> f64 {
    let mut times: Vec<f64> = obs.vis.iter().map(|v| v.time).collect();
    times.sort_unstable_by(|a, b| a.total_cmp(b));
    times.dedup_by(|a, b| (*a - *b).abs() < 1e-6);
    let gaps: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    let median = crate::math::median(&gaps);
    if median.is_finite() && median > 0.0 {
        median
    } else {
        10.0
    }
}
