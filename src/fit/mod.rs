// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The model-scoring loop: simulate noisy observations of a model image over
//! a grid of (position angle, flux scale) trials and score each against the
//! data with chi-squared statistics on visibility amplitude, closure phase
//! and polarized amplitude.

#[cfg(test)]
mod tests;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use vec1::Vec1;

use crate::{
    constants::{CHI2_UV_CUTOFF, FIRST_NULL_UV_MAX},
    image::ModelImage,
    math::{median, std_dev, wrap_cphase},
    obs::{ClosurePhase, Obsdata},
    sim::{observe, observe_nonoise, SimOptions},
};

/// Reduced chi-squared components for one trial. The "self" variants score
/// the noisy realisations against the perfect simulation instead of the data,
/// giving the noise floor of each statistic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Chi2 {
    pub amp: f64,
    pub amp_self: f64,
    pub cphase: f64,
    pub cphase_self: f64,
    pub lp_amp: f64,
    pub lp_amp_self: f64,

    /// Amplitude and closure-phase chi-squared combined, weighted by their
    /// sample counts.
    pub combined: f64,
}

/// One scored point of the trial grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trial {
    /// Position angle \[degrees\].
    pub pa: f64,

    /// Total compact flux \[Jy\].
    pub flux: f64,

    pub chi2: Chi2,

    /// uv distance of the first visibility null \[wavelengths\], from the
    /// noiseless simulation.
    pub first_null: f64,

    /// The largest visibility amplitude beyond the first null \[Jy\].
    pub bump_amp: f64,
}

/// Everything that parameterizes a grid search.
#[derive(Debug, Clone)]
pub struct FitParams {
    /// Position angles to try \[degrees\].
    pub pa_grid: Vec1<f64>,

    /// Total fluxes to try \[Jy\].
    pub flux_grid: Vec1<f64>,

    /// Noisy realisations per trial.
    pub num_realisations: usize,

    /// RNG seed; a fixed seed reproduces the whole search.
    pub seed: u64,

    /// Scan-segmentation gap \[seconds\].
    pub scan_gap: f64,

    pub sim: SimOptions,
}

/// The outcome of a grid search: every trial, plus the two-stage selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResults {
    pub trials: Vec<Trial>,

    /// The flux scale selected by minimizing amplitude chi-squared
    /// (marginalized over position angle).
    pub best_flux: f64,

    /// The position angle selected by minimizing the combined chi-squared at
    /// the selected flux scale.
    pub best_pa: f64,

    /// `trials` index of the selected (pa, flux) pair.
    pub best_index: usize,
}

/// Per-sample medians and standard errors over an ensemble of noisy
/// realisations.
pub struct EnsembleStats {
    pub amp_med: Vec<f64>,
    pub amp_err: Vec<f64>,
    pub pamp_med: Vec<f64>,
    pub pamp_err: Vec<f64>,
    pub cphases: Vec<ClosurePhase>,
    pub cp_med: Vec<f64>,
    pub cp_err: Vec<f64>,
}

/// Summarize an ensemble of realisations, all derived from the same averaged
/// sample set (so samples and closure triangles align one-to-one).
pub fn summarize(realisations: &[Obsdata]) -> EnsembleStats {
    let num_real = realisations.len();
    let stderr = |values: &[f64]| std_dev(values) / (num_real as f64).sqrt();

    let amps: Vec<Vec<f64>> = realisations.iter().map(Obsdata::amps).collect();
    let pamps: Vec<Vec<f64>> = realisations.iter().map(Obsdata::pamps).collect();
    let cps: Vec<Vec<ClosurePhase>> =
        realisations.iter().map(Obsdata::closure_phases).collect();

    let num_vis = amps.first().map(Vec::len).unwrap_or(0);
    let num_cp = cps.first().map(Vec::len).unwrap_or(0);
    let mut stats = EnsembleStats {
        amp_med: Vec::with_capacity(num_vis),
        amp_err: Vec::with_capacity(num_vis),
        pamp_med: Vec::with_capacity(num_vis),
        pamp_err: Vec::with_capacity(num_vis),
        cphases: cps.first().cloned().unwrap_or_default(),
        cp_med: Vec::with_capacity(num_cp),
        cp_err: Vec::with_capacity(num_cp),
    };
    for i in 0..num_vis {
        let a: Vec<f64> = amps.iter().map(|r| r[i]).collect();
        let p: Vec<f64> = pamps.iter().map(|r| r[i]).collect();
        stats.amp_med.push(median(&a));
        stats.amp_err.push(stderr(&a));
        stats.pamp_med.push(median(&p));
        stats.pamp_err.push(stderr(&p));
    }
    for i in 0..num_cp {
        // Wrap each realisation's phase relative to the first before taking
        // statistics, so ensembles straddling +/-180 don't average to 0.
        let reference = cps[0][i].cphase;
        let c: Vec<f64> = cps
            .iter()
            .map(|r| reference + wrap_cphase(r[i].cphase - reference))
            .collect();
        stats.cp_med.push(wrap_cphase(median(&c)));
        stats.cp_err.push(stderr(&c));
    }
    stats
}

/// Reduced amplitude chi-squared of an ensemble against an observation,
/// restricted to baselines longer than the uv cutoff. The denominator is the
/// ensemble's standard error; the data's own sigmas don't enter.
pub fn chi2_amp(data: &Obsdata, stats: &EnsembleStats) -> f64 {
    let data_amps = data.amps();
    let uvdists = data.uvdists();
    let mut sum = 0.0;
    let mut n = 0;
    for i in 0..data_amps.len() {
        if uvdists[i] <= CHI2_UV_CUTOFF {
            continue;
        }
        sum += ((data_amps[i] - stats.amp_med[i]) / stats.amp_err[i]).powi(2);
        n += 1;
    }
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Reduced polarized-amplitude chi-squared. Samples with NaN polarization in
/// either the data or the ensemble are skipped; unlike the total-intensity
/// statistic there is no uv cutoff.
pub fn chi2_lp_amp(data: &Obsdata, stats: &EnsembleStats) -> f64 {
    let data_pamps = data.pamps();
    let mut sum = 0.0;
    let mut n = 0;
    for i in 0..data_pamps.len() {
        if data_pamps[i].is_nan() || stats.pamp_med[i].is_nan() {
            continue;
        }
        sum += ((data_pamps[i] - stats.pamp_med[i]) / stats.pamp_err[i]).powi(2);
        n += 1;
    }
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Reduced closure-phase chi-squared. The difference is wrapped into
/// (-180, 180] degrees before squaring, so phases straddling the boundary
/// aren't penalized for the wrap. As with the amplitudes, the denominator is
/// the ensemble's standard error, not the data's linearized sigma.
pub fn chi2_cphase(data_cp: &[ClosurePhase], stats: &EnsembleStats) -> f64 {
    if data_cp.is_empty() {
        return f64::NAN;
    }
    let mut sum = 0.0;
    for (i, cp) in data_cp.iter().enumerate() {
        let diff = wrap_cphase(cp.cphase - stats.cp_med[i]);
        sum += (diff / stats.cp_err[i]).powi(2);
    }
    sum / data_cp.len() as f64
}

/// Count the amplitude samples that pass the uv cutoff (the weight of the
/// amplitude term in the combined statistic).
fn num_amp_samples(data: &Obsdata) -> usize {
    data.uvdists()
        .iter()
        .filter(|&&uv| uv > CHI2_UV_CUTOFF)
        .count()
}

/// The uv distance of the first visibility null and the amplitude of the
/// post-null "bump", from a noiseless simulation. The null is searched for
/// below 8 Gigalambda; the bump is the largest amplitude on any baseline
/// longer than the null, however long.
pub fn first_null(perfect: &Obsdata) -> (f64, f64) {
    let amps = perfect.amps();
    let uvdists = perfect.uvdists();
    let mut null_uv = f64::NAN;
    let mut null_amp = f64::INFINITY;
    for i in 0..amps.len() {
        if uvdists[i] < FIRST_NULL_UV_MAX && amps[i] < null_amp {
            null_amp = amps[i];
            null_uv = uvdists[i];
        }
    }
    let bump_amp = (0..amps.len())
        .filter(|&i| uvdists[i] > null_uv)
        .map(|i| amps[i])
        .fold(f64::NAN, f64::max);
    (null_uv, bump_amp)
}

/// Score one (position angle, flux) pair.
#[allow(clippy::too_many_arguments)]
fn score_trial(
    image: &ModelImage,
    pa: f64,
    flux: f64,
    data: &Obsdata,
    data_cp: &[ClosurePhase],
    scans: &[(f64, f64)],
    params: &FitParams,
    rng: &mut StdRng,
) -> Trial {
    let model = image.scaled_to_flux(flux).rotated(pa);
    let perfect = observe_nonoise(&model, data);
    let perfect_avg = perfect.avg_coherent(scans);
    let perfect_cp = perfect_avg.closure_phases();

    let realisations: Vec<Obsdata> = (0..params.num_realisations)
        .map(|_| observe(&perfect, data, scans, params.sim, rng).avg_coherent(scans))
        .collect();
    let stats = summarize(&realisations);

    let amp = chi2_amp(data, &stats);
    let cphase = chi2_cphase(data_cp, &stats);
    let lp_amp = chi2_lp_amp(data, &stats);
    let amp_self = chi2_amp(&perfect_avg, &stats);
    let cphase_self = chi2_cphase(&perfect_cp, &stats);
    let lp_amp_self = chi2_lp_amp(&perfect_avg, &stats);

    let n_amp = num_amp_samples(data) as f64;
    let n_cp = data_cp.len() as f64;
    let combined = (n_amp * amp + n_cp * cphase) / (n_amp + n_cp);

    let (first_null, bump_amp) = crate::fit::first_null(&perfect_avg);

    debug!(
        "PA {pa:7.2} deg, flux {flux:5.2} Jy: chi2_amp {amp:8.3}, chi2_cp {cphase:8.3}, combined {combined:8.3}"
    );
    Trial {
        pa,
        flux,
        chi2: Chi2 {
            amp,
            amp_self,
            cphase,
            cphase_self,
            lp_amp,
            lp_amp_self,
            combined,
        },
        first_null,
        bump_amp,
    }
}

/// Exhaustively score the (position angle, flux) grid, then select the best
/// pair in two stages: first the flux scale that minimizes the amplitude
/// chi-squared (over any position angle), then the position angle that
/// minimizes the combined chi-squared at that flux.
pub fn run_fit(image: &ModelImage, data: &Obsdata, params: &FitParams) -> FitResults {
    let scans = data.add_scans(params.scan_gap);
    let data_avg = data.avg_coherent(&scans);
    let data_cp = data_avg.closure_phases();
    info!(
        "Scoring {} PA x {} flux trials against {} averaged visibilities and {} closure phases",
        params.pa_grid.len(),
        params.flux_grid.len(),
        data_avg.vis.len(),
        data_cp.len()
    );

    let num_trials = params.pa_grid.len() * params.flux_grid.len();
    let progress = ProgressBar::with_draw_target(
        Some(num_trials as u64),
        if crate::PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::with_template(
            "{msg:17}: [{wide_bar:.blue}] {pos:3}/{len:3} trials ({elapsed_precise}<{eta_precise})",
        )
        .expect("template is valid")
        .progress_chars("=> "),
    )
    .with_message("Scoring models");
    progress.tick();

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut trials = Vec::with_capacity(num_trials);
    for &flux in &params.flux_grid {
        for &pa in &params.pa_grid {
            trials.push(score_trial(
                image, pa, flux, &data_avg, &data_cp, &scans, params, &mut rng,
            ));
            progress.inc(1);
        }
    }
    progress.finish_and_clear();

    // Stage 1: the flux whose best trial (over PA) has the lowest amplitude
    // chi-squared.
    let best_flux = params
        .flux_grid
        .iter()
        .copied()
        .min_by(|&f1, &f2| {
            let best_amp = |f: f64| {
                trials
                    .iter()
                    .filter(|t| t.flux == f)
                    .map(|t| t.chi2.amp)
                    .fold(f64::INFINITY, f64::min)
            };
            best_amp(f1).total_cmp(&best_amp(f2))
        })
        .unwrap_or(*params.flux_grid.first());

    // Stage 2: the combined chi-squared over PA at the selected flux.
    let best_index = trials
        .iter()
        .enumerate()
        .filter(|(_, t)| t.flux == best_flux)
        .min_by(|(_, t1), (_, t2)| t1.chi2.combined.total_cmp(&t2.chi2.combined))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let best = &trials[best_index];
    info!(
        "Best trial: PA {:.2} deg, flux {:.3} Jy (chi2_amp {:.3}, chi2_cp {:.3}, combined {:.3})",
        best.pa, best.flux, best.chi2.amp, best.chi2.cphase, best.chi2.combined
    );

    FitResults {
        best_flux,
        best_pa: best.pa,
        best_index,
        trials,
    }
}
