// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use ndarray::prelude::*;
use num_complex::Complex64;
use vec1::vec1;

use super::*;
use crate::{
    constants::RAD_PER_UAS,
    coord::RADec,
    obs::{Station, Visibility},
};

fn test_image() -> ModelImage {
    // An asymmetric double: the position angle is well constrained.
    let mut stokes = Array3::zeros((4, 9, 9));
    stokes[(0, 4, 4)] = 2.0;
    stokes[(0, 4, 1)] = 1.0;
    stokes[(0, 2, 6)] = 0.5;
    ModelImage {
        stokes,
        pixel_size: 4.0 * RAD_PER_UAS,
        source: "M 87".to_string(),
        pos: RADec::from_degrees(187.705930, 12.391123),
        freq: 2.3e11,
        mjd: 57849.0,
    }
}

fn test_obs() -> Obsdata {
    let mut vis = vec![];
    for i_time in 0..6 {
        for (i_bl, (ant1, ant2)) in [(0, 1), (0, 2), (1, 2)].into_iter().enumerate() {
            // Spread the baselines over 1-8 Gigalambda and rotate them a
            // little with time, like earth-rotation synthesis does.
            let r = 1e9 + 1e9 * (1 + 2 * i_bl) as f64;
            let theta = 0.3 * i_bl as f64 + 0.05 * i_time as f64;
            // Snapshots further apart than the scan gap, so averaging doesn't
            // smear the rotating baselines.
            vis.push(Visibility {
                time: i_time as f64 * 200.0,
                ant1,
                ant2,
                i: Complex64::new(1.0, 0.0),
                q: Complex64::new(0.0, 0.0),
                u: Complex64::new(0.0, 0.0),
                sigma: 1e-4,
                uu: r * theta.cos(),
                vv: r * theta.sin(),
            });
        }
    }
    Obsdata {
        stations: ["AA", "LM", "SM"]
            .iter()
            .map(|&name| Station {
                name: name.to_string(),
                sefd: 1000.0,
            })
            .collect(),
        vis,
        pos: RADec::from_degrees(187.705930, 12.391123),
        freq: 2.3e11,
        bandwidth: 4e9,
        mjd: 57849.0,
    }
}

/// Synthetic data made from the image itself at a known (PA, flux); the grid
/// search must find that pair.
#[test]
fn grid_search_recovers_an_injected_pa_and_flux() {
    let image = test_image();
    let (pa_true, flux_true) = (45.0, 1.0);

    let mut data = test_obs();
    let truth = crate::sim::observe_nonoise(
        &image.scaled_to_flux(flux_true).rotated(pa_true),
        &data,
    );
    for (d, t) in data.vis.iter_mut().zip(truth.vis.iter()) {
        d.i = t.i;
        d.q = t.q;
        d.u = t.u;
    }

    let params = FitParams {
        pa_grid: vec1![0.0, 45.0, 90.0, 135.0],
        flux_grid: vec1![0.5, 1.0, 2.0],
        num_realisations: 8,
        seed: 99,
        scan_gap: 120.0,
        sim: crate::sim::SimOptions {
            sefd_factor: 0.0,
            gain_errors: false,
            phase_errors: false,
            leakage: false,
        },
    };
    let results = run_fit(&image, &data, &params);

    assert_eq!(results.trials.len(), 12);
    assert_abs_diff_eq!(results.best_flux, flux_true);
    assert_abs_diff_eq!(results.best_pa, pa_true);
    let best = &results.trials[results.best_index];
    // At the truth, the residuals are pure (tiny) noise.
    assert!(best.chi2.amp < 10.0, "chi2_amp = {}", best.chi2.amp);
}

#[test]
fn closure_phase_differences_wrap_before_squaring() {
    // Data at +179 degrees, model at -179: the physical difference is 2
    // degrees, not 358.
    let data_cp = vec![crate::obs::ClosurePhase {
        time: 0.0,
        triangle: [0, 1, 2],
        cphase: 179.0,
        sigma_cp: 1.0,
        u: [1e9; 3],
        v: [1e9; 3],
    }];
    let stats = EnsembleStats {
        amp_med: vec![],
        amp_err: vec![],
        pamp_med: vec![],
        pamp_err: vec![],
        cphases: data_cp.clone(),
        cp_med: vec![-179.0],
        cp_err: vec![1.0],
    };
    assert_abs_diff_eq!(chi2_cphase(&data_cp, &stats), 4.0, epsilon = 1e-12);
}

#[test]
fn boundary_closure_phases_survive_wrapping() {
    // A difference of exactly 180 degrees contributes (180/sigma)^2, whether
    // it arrives as +180 or -180.
    for model_cp in [180.0, -180.0] {
        let data_cp = vec![crate::obs::ClosurePhase {
            time: 0.0,
            triangle: [0, 1, 2],
            cphase: 0.0,
            sigma_cp: 10.0,
            u: [1e9; 3],
            v: [1e9; 3],
        }];
        let stats = EnsembleStats {
            amp_med: vec![],
            amp_err: vec![],
            pamp_med: vec![],
            pamp_err: vec![],
            cphases: data_cp.clone(),
            cp_med: vec![model_cp],
            cp_err: vec![10.0],
        };
        assert_abs_diff_eq!(chi2_cphase(&data_cp, &stats), 324.0, epsilon = 1e-12);
    }
}

/// The chi-squared denominators are the simulated ensemble's standard errors;
/// the data's thermal sigmas and linearized closure-phase sigmas never enter.
#[test]
fn chi2_denominators_are_the_ensemble_errors() {
    let mut data = test_obs();
    for v in &mut data.vis {
        v.sigma = 1e6;
    }
    let n = data.vis.len();
    let stats = EnsembleStats {
        // Every model amplitude is 1 Jy below the data's.
        amp_med: data.amps().iter().map(|a| a - 1.0).collect(),
        amp_err: vec![0.5; n],
        pamp_med: vec![0.0; n],
        pamp_err: vec![0.5; n],
        cphases: vec![],
        cp_med: vec![],
        cp_err: vec![],
    };
    // (1 / 0.5)^2 = 4 per sample; huge data sigmas would wash this out.
    assert_abs_diff_eq!(chi2_amp(&data, &stats), 4.0, epsilon = 1e-12);

    let data_cp = vec![crate::obs::ClosurePhase {
        time: 0.0,
        triangle: [0, 1, 2],
        cphase: 30.0,
        sigma_cp: 1e6,
        u: [1e9; 3],
        v: [1e9; 3],
    }];
    let stats = EnsembleStats {
        amp_med: vec![],
        amp_err: vec![],
        pamp_med: vec![],
        pamp_err: vec![],
        cphases: data_cp.clone(),
        cp_med: vec![20.0],
        cp_err: vec![5.0],
    };
    assert_abs_diff_eq!(chi2_cphase(&data_cp, &stats), 4.0, epsilon = 1e-12);
}

#[test]
fn amplitude_chi2_ignores_short_baselines() {
    let mut data = test_obs();
    // One sample well below the cutoff with a wild amplitude.
    data.vis[0].uu = 1e8;
    data.vis[0].vv = 0.0;
    data.vis[0].i = Complex64::new(100.0, 0.0);

    let n = data.vis.len();
    let stats = EnsembleStats {
        amp_med: data.amps(),
        amp_err: vec![0.1; n],
        pamp_med: vec![0.0; n],
        pamp_err: vec![0.1; n],
        cphases: vec![],
        cp_med: vec![],
        cp_err: vec![],
    };
    // The model matches the data exactly on every counted sample.
    assert_abs_diff_eq!(chi2_amp(&data, &stats), 0.0, epsilon = 1e-12);
}

/// Unlike the total-intensity amplitudes, the polarized amplitudes carry no
/// uv cutoff: an intra-site baseline still counts.
#[test]
fn polarized_chi2_keeps_short_baselines() {
    let mut data = test_obs();
    data.vis.truncate(2);
    data.vis[0].uu = 1e8;
    data.vis[0].vv = 0.0;
    data.vis[0].q = Complex64::new(0.6, 0.0);
    data.vis[0].u = Complex64::new(0.0, 0.0);

    let stats = EnsembleStats {
        amp_med: vec![0.0; 2],
        amp_err: vec![0.1; 2],
        pamp_med: vec![0.1, data.vis[1].pamp()],
        pamp_err: vec![0.5; 2],
        cphases: vec![],
        cp_med: vec![],
        cp_err: vec![],
    };
    // The short baseline contributes ((0.6 - 0.1) / 0.5)^2 = 1; the other
    // sample matches exactly. Reduced over 2 samples: 0.5.
    assert_abs_diff_eq!(chi2_lp_amp(&data, &stats), 0.5, epsilon = 1e-12);
}

#[test]
fn first_null_finds_the_minimum_and_the_bump() {
    let mut obs = test_obs();
    obs.vis.truncate(5);
    let setups = [
        (2e9, 0.8),
        (4e9, 0.05),   // the null
        (6e9, 0.3),
        (8.5e9, 0.01), // too long to be the null
        (9e9, 2.0),    // the bump: no upper bound on the bump search
    ];
    for (v, &(uv, amp)) in obs.vis.iter_mut().zip(setups.iter()) {
        v.uu = uv;
        v.vv = 0.0;
        v.i = Complex64::new(amp, 0.0);
    }
    let (null_uv, bump) = first_null(&obs);
    assert_abs_diff_eq!(null_uv, 4e9);
    assert_abs_diff_eq!(bump, 2.0);
}

#[test]
fn ensemble_medians_are_per_sample() {
    let mut a = test_obs();
    let mut b = test_obs();
    let mut c = test_obs();
    for (i, obs) in [&mut a, &mut b, &mut c].into_iter().enumerate() {
        for v in &mut obs.vis {
            v.i = Complex64::new(1.0 + i as f64, 0.0);
        }
    }
    let stats = summarize(&[a, b, c]);
    assert!(stats.amp_med.iter().all(|&m| (m - 2.0).abs() < 1e-12));
    // std over {1,2,3} is sqrt(2/3); stderr divides by sqrt(3).
    let expected = (2.0_f64 / 3.0).sqrt() / 3.0_f64.sqrt();
    assert!(stats.amp_err.iter().all(|&e| (e - expected).abs() < 1e-12));
}
