// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Simulate a synthetic observation of one model image at one (position
//! angle, flux) pair, using the uv coverage of a real observation.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{load_image, ImageInputFormat, ImageLoadArgs};
use super::ImfitError;
use crate::{
    constants::{DEFAULT_NUM_REALISATIONS, DEFAULT_SCAN_GAP},
    fit::summarize,
    image::mjd_from_date,
    io::uvfits::read_uvfits,
    obs::Obsdata,
    sim::{observe, observe_nonoise, SimOptions},
};

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
pub(super) struct SimulateArgs {
    /// Path to the UV-FITS observation supplying the uv coverage and,
    /// optionally, the noise.
    #[clap(name = "DATA_UVFITS", parse(from_os_str))]
    pub(super) data: PathBuf,

    /// Path to the model image.
    #[clap(name = "IMAGE", parse(from_os_str))]
    pub(super) image: PathBuf,

    /// The format of the model image.
    #[clap(arg_enum, short, long)]
    pub(super) format: ImageInputFormat,

    /// The source the image models; required for the ASCII formats.
    #[clap(short, long)]
    pub(super) source: Option<String>,

    /// The observing frequency [Hz]; required for the ASCII formats.
    #[clap(long)]
    pub(super) freq: Option<f64>,

    /// The pixel size [microarcseconds]; required for ipole images.
    #[clap(long)]
    pub(super) pixel_size: Option<f64>,

    /// The observation date, YYYY-MM-DD. Default: the data's own date.
    #[clap(long)]
    pub(super) date: Option<String>,

    /// Rotate the image by this position angle [degrees].
    #[clap(long, default_value = "0.0")]
    pub(super) pa: f64,

    /// Rescale the image to this total flux [Jy]. Default: leave the image's
    /// flux alone.
    #[clap(long)]
    pub(super) flux: Option<f64>,

    /// The number of noisy realisations to summarize over.
    #[clap(short = 'n', long, default_value_t = DEFAULT_NUM_REALISATIONS)]
    pub(super) realisations: usize,

    /// The random seed. A fixed seed reproduces the realisations exactly.
    #[clap(long, default_value = "0")]
    pub(super) seed: u64,

    /// The time gap that separates two scans [seconds].
    #[clap(long, default_value_t = DEFAULT_SCAN_GAP)]
    pub(super) scan_gap: f64,

    /// Scale on the station SEFDs used for thermal noise; 0 means "use the
    /// data's own sigmas".
    #[clap(long, default_value = "0.0")]
    pub(super) sefd_factor: f64,

    /// Don't apply station gain errors.
    #[clap(long)]
    #[serde(default)]
    pub(super) no_gain_errors: bool,

    /// Apply per-station, per-scan phase errors (uncalibrated phases).
    #[clap(long)]
    #[serde(default)]
    pub(super) phase_errors: bool,

    /// Don't apply polarization leakage.
    #[clap(long)]
    #[serde(default)]
    pub(super) no_leakage: bool,

    /// Skip all corruptions and write the idealized observation.
    #[clap(long)]
    #[serde(default)]
    pub(super) no_noise: bool,

    /// Stations to drop from the data before simulating.
    #[clap(long, multiple_values(true), default_values = &["SR"])]
    pub(super) flag_sites: Vec<String>,

    /// Path to the output JSON. Default: "simulation.json".
    #[clap(short, long, parse(from_os_str), default_value = "simulation.json")]
    pub(super) output: PathBuf,
}

/// One averaged sample of the simulated observation, as written to JSON.
#[derive(Debug, Serialize, Deserialize)]
struct SampleRecord {
    time: f64,
    baseline: [String; 2],
    uvdist: f64,
    amp: f64,
    amp_err: f64,
    pamp: f64,
    pamp_err: f64,
    sigma: f64,
}

/// One closure phase of the simulated observation, as written to JSON.
#[derive(Debug, Serialize, Deserialize)]
struct CphaseRecord {
    time: f64,
    triangle: [String; 3],
    cphase: f64,
    cphase_err: f64,
    sigma_cp: f64,
    max_uvdist: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SimulationOutput {
    pa: f64,
    flux: f64,
    num_realisations: usize,
    samples: Vec<SampleRecord>,
    closure_phases: Vec<CphaseRecord>,
}

impl SimulateArgs {
    pub(super) fn run(self, dry_run: bool) -> Result<(), ImfitError> {
        let data = read_uvfits(&self.data)?;
        let flags: Vec<&str> = self.flag_sites.iter().map(String::as_str).collect();
        let data = data.flag_sites(&flags);

        let mjd = match &self.date {
            Some(date) => mjd_from_date(date)?,
            None => data.mjd,
        };
        let image = load_image(ImageLoadArgs {
            input: &self.image,
            format: self.format,
            source: self.source.as_deref(),
            freq: self.freq,
            pixel_size: self.pixel_size,
            mjd,
        })?;

        if dry_run {
            info!("Dry run -- not simulating anything.");
            return Ok(());
        }

        let model = match self.flux {
            Some(flux) => image.scaled_to_flux(flux),
            None => image,
        }
        .rotated(self.pa);
        let flux = model.total_flux();

        let scans = data.add_scans(self.scan_gap);
        let perfect = observe_nonoise(&model, &data);

        let (ensemble, num_realisations) = if self.no_noise {
            (vec![perfect.avg_coherent(&scans)], 1)
        } else {
            if self.realisations == 0 {
                return Err(SimulateArgsError::ZeroRealisations.into());
            }
            let opts = SimOptions {
                sefd_factor: self.sefd_factor,
                gain_errors: !self.no_gain_errors,
                phase_errors: self.phase_errors,
                leakage: !self.no_leakage,
            };
            let mut rng = StdRng::seed_from_u64(self.seed);
            let ensemble: Vec<Obsdata> = (0..self.realisations)
                .map(|_| observe(&perfect, &data, &scans, opts, &mut rng).avg_coherent(&scans))
                .collect();
            (ensemble, self.realisations)
        };

        let stats = summarize(&ensemble);
        let averaged = &ensemble[0];
        let station = |i: usize| averaged.stations[i].name.clone();
        let samples = averaged
            .vis
            .iter()
            .enumerate()
            .map(|(i, v)| SampleRecord {
                time: v.time,
                baseline: [station(v.ant1), station(v.ant2)],
                uvdist: v.uvdist(),
                amp: stats.amp_med[i],
                amp_err: stats.amp_err[i],
                pamp: stats.pamp_med[i],
                pamp_err: stats.pamp_err[i],
                sigma: v.sigma,
            })
            .collect();
        let closure_phases = stats
            .cphases
            .iter()
            .enumerate()
            .map(|(i, cp)| CphaseRecord {
                time: cp.time,
                triangle: [
                    station(cp.triangle[0]),
                    station(cp.triangle[1]),
                    station(cp.triangle[2]),
                ],
                cphase: stats.cp_med[i],
                cphase_err: stats.cp_err[i],
                sigma_cp: cp.sigma_cp,
                max_uvdist: cp.max_uvdist(),
            })
            .collect();

        let output = SimulationOutput {
            pa: self.pa,
            flux,
            num_realisations,
            samples,
            closure_phases,
        };
        let file = BufWriter::new(File::create(&self.output)?);
        serde_json::to_writer_pretty(file, &output)?;
        info!(
            "Wrote {} samples and {} closure phases to {}",
            output.samples.len(),
            output.closure_phases.len(),
            self.output.display()
        );
        Ok(())
    }
}

#[derive(Error, Debug)]
pub(super) enum SimulateArgsError {
    #[error("Can't summarize over 0 realisations; use --no-noise for the idealized observation")]
    ZeroRealisations,
}
