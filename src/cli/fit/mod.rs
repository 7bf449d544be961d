// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Score a model image against EHT data over a grid of (position angle,
//! flux scale) trials.


use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vec1::Vec1;

use super::common::{load_image, ImageInputFormat, ImageLoadArgs, ARG_FILE_HELP};
use super::ImfitError;
use crate::{
    constants::{DEFAULT_NUM_REALISATIONS, DEFAULT_SCAN_GAP},
    fit::{run_fit, FitParams},
    image::{mjd_from_date, ModelImage},
    io::uvfits::read_uvfits,
    obs::Obsdata,
    sim::SimOptions,
};

const DEFAULT_NUM_PA: usize = 36;
const DEFAULT_PA_MIN: f64 = -180.0;
const DEFAULT_PA_MAX: f64 = 170.0;
const DEFAULT_OUTPUT: &str = "fit_results.json";

lazy_static::lazy_static! {
    static ref NUM_PA_HELP: String =
        format!("The number of position angles on the trial grid. Default: {DEFAULT_NUM_PA}");

    static ref PA_MIN_HELP: String =
        format!("The smallest trial position angle [degrees]. Default: {DEFAULT_PA_MIN}");

    static ref PA_MAX_HELP: String =
        format!("The largest trial position angle [degrees]. Default: {DEFAULT_PA_MAX}");

    static ref REALISATIONS_HELP: String =
        format!("The number of noisy realisations per trial. Default: {DEFAULT_NUM_REALISATIONS}");

    static ref SCAN_GAP_HELP: String =
        format!("The time gap that separates two scans [seconds]. Default: {DEFAULT_SCAN_GAP}");

    static ref OUTPUT_HELP: String =
        format!("Path to the output JSON results table. Default: {DEFAULT_OUTPUT}");
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct FitCliArgs {
    /// Path to the UV-FITS observation to fit against.
    #[clap(name = "DATA_UVFITS", parse(from_os_str))]
    pub(super) data: Option<PathBuf>,

    /// Path to the model image.
    #[clap(name = "IMAGE", parse(from_os_str))]
    pub(super) image: Option<PathBuf>,

    /// The format of the model image.
    #[clap(arg_enum, short, long)]
    pub(super) format: Option<ImageInputFormat>,

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

    #[clap(long, help = NUM_PA_HELP.as_str())]
    pub(super) num_pa: Option<usize>,

    #[clap(long, help = PA_MIN_HELP.as_str())]
    pub(super) pa_min: Option<f64>,

    #[clap(long, help = PA_MAX_HELP.as_str())]
    pub(super) pa_max: Option<f64>,

    /// The number of flux scales on the trial grid. With no --flux-min and
    /// --flux-max, a single trial at the image's own flux is used.
    #[clap(long)]
    pub(super) num_flux: Option<usize>,

    /// The smallest trial total flux [Jy].
    #[clap(long)]
    pub(super) flux_min: Option<f64>,

    /// The largest trial total flux [Jy].
    #[clap(long)]
    pub(super) flux_max: Option<f64>,

    #[clap(short = 'n', long, help = REALISATIONS_HELP.as_str())]
    pub(super) realisations: Option<usize>,

    /// The random seed. A fixed seed reproduces the whole grid search.
    #[clap(long)]
    pub(super) seed: Option<u64>,

    #[clap(long, help = SCAN_GAP_HELP.as_str())]
    pub(super) scan_gap: Option<f64>,

    /// Scale on the station SEFDs used for thermal noise; 0 means "use the
    /// data's own sigmas".
    #[clap(long)]
    pub(super) sefd_factor: Option<f64>,

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

    /// Stations to drop from the data before fitting. Default: SR (the SMA
    /// reference antenna).
    #[clap(long, multiple_values(true))]
    pub(super) flag_sites: Option<Vec<String>>,

    #[clap(short, long, parse(from_os_str), help = OUTPUT_HELP.as_str())]
    pub(super) output: Option<PathBuf>,

    /// Write diagnostic plots of the best trial into this directory.
    #[clap(long, parse(from_os_str))]
    pub(super) plot_dir: Option<PathBuf>,
}

impl FitCliArgs {
    /// Merge two sets of arguments, preferring `self` (the CLI) over `other`
    /// (the file).
    fn merge(self, other: FitCliArgs) -> FitCliArgs {
        FitCliArgs {
            data: self.data.or(other.data),
            image: self.image.or(other.image),
            format: self.format.or(other.format),
            source: self.source.or(other.source),
            freq: self.freq.or(other.freq),
            pixel_size: self.pixel_size.or(other.pixel_size),
            date: self.date.or(other.date),
            num_pa: self.num_pa.or(other.num_pa),
            pa_min: self.pa_min.or(other.pa_min),
            pa_max: self.pa_max.or(other.pa_max),
            num_flux: self.num_flux.or(other.num_flux),
            flux_min: self.flux_min.or(other.flux_min),
            flux_max: self.flux_max.or(other.flux_max),
            realisations: self.realisations.or(other.realisations),
            seed: self.seed.or(other.seed),
            scan_gap: self.scan_gap.or(other.scan_gap),
            sefd_factor: self.sefd_factor.or(other.sefd_factor),
            no_gain_errors: self.no_gain_errors || other.no_gain_errors,
            phase_errors: self.phase_errors || other.phase_errors,
            no_leakage: self.no_leakage || other.no_leakage,
            flag_sites: self.flag_sites.or(other.flag_sites),
            output: self.output.or(other.output),
            plot_dir: self.plot_dir.or(other.plot_dir),
        }
    }
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct FitArgs {
    #[clap(name = "ARGUMENTS_FILE", long = "args-file", parse(from_os_str), help = ARG_FILE_HELP)]
    #[serde(skip)]
    pub(super) args_file: Option<PathBuf>,

    #[clap(flatten)]
    #[serde(rename = "fit")]
    #[serde(default)]
    pub(super) fit_args: FitCliArgs,
}

/// Everything `parse` distils out of the arguments.
struct FitRun {
    image: ModelImage,
    data: Obsdata,
    params: FitParams,
    output: PathBuf,
    plot_dir: Option<PathBuf>,
}

impl FitArgs {
    /// Consolidate CLI arguments and the arguments file into a single struct,
    /// preferring CLI arguments where both are specified.
    pub(super) fn merge(self) -> Result<FitArgs, ImfitError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;
        if let Some(arg_file) = cli_args.args_file {
            let FitArgs {
                args_file: _,
                fit_args,
            } = unpack_arg_file!(arg_file);

            Ok(FitArgs {
                args_file: None,
                fit_args: cli_args.fit_args.merge(fit_args),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<FitRun, ImfitError> {
        debug!("{:#?}", self);

        let FitCliArgs {
            data,
            image,
            format,
            source,
            freq,
            pixel_size,
            date,
            num_pa,
            pa_min,
            pa_max,
            num_flux,
            flux_min,
            flux_max,
            realisations,
            seed,
            scan_gap,
            sefd_factor,
            no_gain_errors,
            phase_errors,
            no_leakage,
            flag_sites,
            output,
            plot_dir,
        } = self.fit_args;

        let data_path = data.ok_or(FitArgsError::NoData)?;
        let image_path = image.ok_or(FitArgsError::NoImage)?;
        let format = format.ok_or(FitArgsError::NoFormat)?;

        let data = read_uvfits(&data_path)?;
        let flag_sites = flag_sites.unwrap_or_else(|| vec!["SR".to_string()]);
        let flags: Vec<&str> = flag_sites.iter().map(String::as_str).collect();
        let data = data.flag_sites(&flags);

        let mjd = match &date {
            Some(date) => mjd_from_date(date)?,
            None => data.mjd,
        };
        let image = load_image(ImageLoadArgs {
            input: &image_path,
            format,
            source: source.as_deref(),
            freq: freq.or(Some(data.freq)),
            pixel_size,
            mjd,
        })?;

        let pa_grid = linspace(
            pa_min.unwrap_or(DEFAULT_PA_MIN),
            pa_max.unwrap_or(DEFAULT_PA_MAX),
            num_pa.unwrap_or(DEFAULT_NUM_PA),
        )
        .ok_or(FitArgsError::BadPaGrid)?;
        let flux_grid = match (flux_min, flux_max) {
            (Some(min), Some(max)) => {
                linspace(min, max, num_flux.unwrap_or(5)).ok_or(FitArgsError::BadFluxGrid)?
            }
            (None, None) => Vec1::new(image.total_flux()),
            _ => return Err(FitArgsError::OnlyOneFluxBound.into()),
        };
        let num_realisations = realisations.unwrap_or(DEFAULT_NUM_REALISATIONS);
        if num_realisations == 0 {
            return Err(FitArgsError::ZeroRealisations.into());
        }

        let params = FitParams {
            pa_grid,
            flux_grid,
            num_realisations,
            seed: seed.unwrap_or(0),
            scan_gap: scan_gap.unwrap_or(DEFAULT_SCAN_GAP),
            sim: SimOptions {
                sefd_factor: sefd_factor.unwrap_or(0.0),
                gain_errors: !no_gain_errors,
                phase_errors,
                leakage: !no_leakage,
            },
        };
        Ok(FitRun {
            image,
            data,
            params,
            output: output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            plot_dir,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), ImfitError> {
        let FitRun {
            image,
            data,
            params,
            output,
            plot_dir,
        } = self.parse()?;

        if dry_run {
            info!("Dry run -- not fitting anything.");
            return Ok(());
        }

        let results = run_fit(&image, &data, &params);

        let file = BufWriter::new(File::create(&output)?);
        serde_json::to_writer_pretty(file, &results)?;
        info!("Wrote {} trials to {}", results.trials.len(), output.display());

        if let Some(plot_dir) = plot_dir {
            plot_best_trial(&image, &data, &params, &results, &plot_dir)?;
        }
        Ok(())
    }
}

/// Re-simulate the winning trial and plot its comparisons against the data.
#[cfg(feature = "plotting")]
fn plot_best_trial(
    image: &ModelImage,
    data: &Obsdata,
    params: &FitParams,
    results: &crate::fit::FitResults,
    plot_dir: &std::path::Path,
) -> Result<(), ImfitError> {
    use rand::{rngs::StdRng, SeedableRng};

    use crate::fit::summarize;
    use crate::sim::{observe, observe_nonoise};

    std::fs::create_dir_all(plot_dir)?;
    let model = image
        .scaled_to_flux(results.best_flux)
        .rotated(results.best_pa);

    let scans = data.add_scans(params.scan_gap);
    let data_avg = data.avg_coherent(&scans);
    let data_cp = data_avg.closure_phases();
    let perfect = observe_nonoise(&model, &data_avg);
    let mut rng = StdRng::seed_from_u64(params.seed);
    let ensemble: Vec<Obsdata> = (0..params.num_realisations)
        .map(|_| observe(&perfect, &data_avg, &scans, params.sim, &mut rng).avg_coherent(&scans))
        .collect();
    let stats = summarize(&ensemble);

    crate::plot::plot_image(&model, &plot_dir.join("best_model.png"), false)?;
    crate::plot::plot_visamp_comparison(&data_avg, &stats, &plot_dir.join("visamp.png"))?;
    crate::plot::plot_cphase_comparison(&data_cp, &stats, &plot_dir.join("cphase.png"))?;
    info!("Wrote best-trial plots to {}", plot_dir.display());
    Ok(())
}

#[cfg(not(feature = "plotting"))]
fn plot_best_trial(
    _: &ModelImage,
    _: &Obsdata,
    _: &FitParams,
    _: &crate::fit::FitResults,
    _: &std::path::Path,
) -> Result<(), ImfitError> {
    Err(ImfitError::Plotting(
        "Can't plot; eht-imfit was not compiled with the \"plotting\" feature".to_string(),
    ))
}

/// `num` evenly-spaced values over [min, max] (inclusive at both ends). None
/// if the grid is empty or inverted.
fn linspace(min: f64, max: f64, num: usize) -> Option<Vec1<f64>> {
    if num == 0 || max < min {
        return None;
    }
    if num == 1 {
        return Some(Vec1::new(min));
    }
    let step = (max - min) / (num - 1) as f64;
    Vec1::try_from_vec((0..num).map(|i| min + i as f64 * step).collect()).ok()
}

#[derive(Error, Debug)]
pub(super) enum FitArgsError {
    #[error("No UV-FITS data was supplied")]
    NoData,

    #[error("No model image was supplied")]
    NoImage,

    #[error("No image format was supplied")]
    NoFormat,

    #[error("The position-angle grid is empty or inverted")]
    BadPaGrid,

    #[error("The flux grid is empty or inverted")]
    BadFluxGrid,

    #[error("Both --flux-min and --flux-max must be given (or neither)")]
    OnlyOneFluxBound,

    #[error("Can't summarize over 0 realisations")]
    ZeroRealisations,
}
