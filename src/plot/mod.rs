// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Diagnostic plots: model images on microarcsecond axes, and the
//! visibility-domain comparisons between simulated and observed data.

use std::path::Path;

use log::debug;
use ndarray::prelude::*;
use plotters::coord::{cartesian::Cartesian2d, types::RangedCoordf64, Shift};
use plotters::prelude::*;
use thiserror::Error;

use crate::{
    fit::EnsembleStats,
    image::ModelImage,
    obs::{ClosurePhase, Obsdata},
};

const IMAGE_SIZE: (u32, u32) = (800, 760);
const COMPARISON_SIZE: (u32, u32) = (1024, 768);

/// Plotting dynamic range when log scaling an image.
const LOG_FLOOR: f64 = 1e-4;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("While plotting: {0}")]
    Draw(String),

    #[error("Nothing to plot: {0}")]
    Empty(&'static str),
}

// plotters errors are generic over the backend; stringify them at the
// boundary like the rest of the crate's draw calls do.
fn draw_err<E: std::error::Error>(e: E) -> PlotError {
    PlotError::Draw(e.to_string())
}

/// "Hot" colormap over a normalized [0, 1] value.
fn hot(value: f64) -> RGBColor {
    let channel = |x: f64| (x.clamp(0.0, 1.0) * 255.0) as u8;
    RGBColor(
        channel(3.0 * value),
        channel(3.0 * value - 1.0),
        channel(3.0 * value - 2.0),
    )
}

/// Plot the Stokes I plane of a model image on microarcsecond axes.
pub fn plot_image(image: &ModelImage, output: &Path, log_scale: bool) -> Result<(), PlotError> {
    let dim = image.dim();
    if dim == 0 {
        return Err(PlotError::Empty("the image has no pixels"));
    }
    let i_plane = image.stokes.index_axis(Axis(0), 0);
    let max = i_plane.iter().copied().fold(f64::MIN, f64::max);
    if max <= 0.0 {
        return Err(PlotError::Empty("the image has no positive flux"));
    }
    let normalize = |v: f64| {
        if log_scale {
            let floored = (v / max).max(LOG_FLOOR);
            1.0 - floored.log10() / LOG_FLOOR.log10()
        } else {
            v / max
        }
    };

    let extent = dim as f64 * image.pixel_size / crate::constants::RAD_PER_UAS;
    let half = extent / 2.0;

    let root = BitMapBackend::new(output, IMAGE_SIZE).into_drawing_area();
    root.fill(&BLACK).map_err(draw_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!(
                "{} at {:.0} GHz, {:.2} Jy",
                image.source,
                image.freq / 1e9,
                image.total_flux()
            ),
            ("sans-serif", 30).into_font().color(&WHITE),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(55)
        .build_cartesian_2d(-half..half, -half..half)
        .map_err(draw_err)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .axis_style(WHITE)
        .label_style(("sans-serif", 16).into_font().color(&WHITE))
        .x_desc("Relative RA (µas)")
        .y_desc("Relative Dec (µas)")
        .draw()
        .map_err(draw_err)?;

    let pixel_uas = image.pixel_size / crate::constants::RAD_PER_UAS;
    chart
        .draw_series(i_plane.indexed_iter().map(|((r, c), &v)| {
            // East (increasing RA) to the left, north up.
            let x = half - (c as f64 + 1.0) * pixel_uas;
            let y = half - (r as f64 + 1.0) * pixel_uas;
            Rectangle::new(
                [(x, y), (x + pixel_uas, y + pixel_uas)],
                hot(normalize(v)).filled(),
            )
        }))
        .map_err(draw_err)?;

    root.present().map_err(draw_err)?;
    debug!("Wrote image plot to {}", output.display());
    Ok(())
}

/// Observed vs simulated visibility amplitudes against uv distance. The
/// simulated points are the ensemble medians with their standard errors.
pub fn plot_visamp_comparison(
    data: &Obsdata,
    stats: &EnsembleStats,
    output: &Path,
) -> Result<(), PlotError> {
    if data.vis.is_empty() {
        return Err(PlotError::Empty("the observation has no visibilities"));
    }
    let uvdists: Vec<f64> = data.uvdists().iter().map(|uv| uv / 1e9).collect();
    let data_amps = data.amps();
    let data_sigmas = data.sigmas();

    let uv_max = uvdists.iter().copied().fold(0.0, f64::max) * 1.05;
    let amp_max = data_amps
        .iter()
        .chain(stats.amp_med.iter())
        .copied()
        .fold(0.0, f64::max)
        * 1.1;

    let root = BitMapBackend::new(output, COMPARISON_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;
    let mut chart = comparison_chart(
        &root,
        "Visibility amplitude",
        "uv distance (Gλ)",
        "Amplitude (Jy)",
        0.0..uv_max,
        0.0..amp_max,
    )?;

    chart
        .draw_series(uvdists.iter().zip(data_amps.iter()).zip(data_sigmas.iter()).map(
            |((&uv, &amp), &sigma)| {
                ErrorBar::new_vertical(uv, amp - sigma, amp, amp + sigma, BLACK.filled(), 5)
            },
        ))
        .map_err(draw_err)?
        .label("data")
        .legend(|(x, y)| Circle::new((x + 10, y), 4, BLACK.filled()));
    chart
        .draw_series(
            uvdists
                .iter()
                .zip(stats.amp_med.iter())
                .zip(stats.amp_err.iter())
                .map(|((&uv, &amp), &err)| {
                    ErrorBar::new_vertical(uv, amp - err, amp, amp + err, RED.filled(), 5)
                }),
        )
        .map_err(draw_err)?
        .label("simulation")
        .legend(|(x, y)| Circle::new((x + 10, y), 4, RED.filled()));

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(draw_err)?;
    root.present().map_err(draw_err)?;
    debug!("Wrote amplitude comparison to {}", output.display());
    Ok(())
}

/// Observed vs simulated closure phases against the triangle's maximum uv
/// distance.
pub fn plot_cphase_comparison(
    data_cp: &[ClosurePhase],
    stats: &EnsembleStats,
    output: &Path,
) -> Result<(), PlotError> {
    if data_cp.is_empty() {
        return Err(PlotError::Empty("the observation has no closure triangles"));
    }
    let uv_max = data_cp
        .iter()
        .map(|cp| cp.max_uvdist() / 1e9)
        .fold(0.0, f64::max)
        * 1.05;

    let root = BitMapBackend::new(output, COMPARISON_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;
    let mut chart = comparison_chart(
        &root,
        "Closure phase",
        "Maximum triangle uv distance (Gλ)",
        "Closure phase (deg)",
        0.0..uv_max,
        -190.0..190.0,
    )?;

    chart
        .draw_series(data_cp.iter().map(|cp| {
            let uv = cp.max_uvdist() / 1e9;
            ErrorBar::new_vertical(
                uv,
                cp.cphase - cp.sigma_cp,
                cp.cphase,
                cp.cphase + cp.sigma_cp,
                BLACK.filled(),
                5,
            )
        }))
        .map_err(draw_err)?
        .label("data")
        .legend(|(x, y)| Circle::new((x + 10, y), 4, BLACK.filled()));
    chart
        .draw_series(
            stats
                .cphases
                .iter()
                .zip(stats.cp_med.iter())
                .zip(stats.cp_err.iter())
                .map(|((cp, &med), &err)| {
                    let uv = cp.max_uvdist() / 1e9;
                    ErrorBar::new_vertical(uv, med - err, med, med + err, RED.filled(), 5)
                }),
        )
        .map_err(draw_err)?
        .label("simulation")
        .legend(|(x, y)| Circle::new((x + 10, y), 4, RED.filled()));

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(draw_err)?;
    root.present().map_err(draw_err)?;
    debug!("Wrote closure-phase comparison to {}", output.display());
    Ok(())
}

#[allow(clippy::type_complexity)]
fn comparison_chart<'a>(
    root: &DrawingArea<BitMapBackend<'a>, Shift>,
    caption: &str,
    x_desc: &str,
    y_desc: &str,
    x_range: std::ops::Range<f64>,
    y_range: std::ops::Range<f64>,
) -> Result<
    ChartContext<'a, BitMapBackend<'a>, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    PlotError,
> {
    let mut chart = ChartBuilder::on(root)
        .caption(caption, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)
        .map_err(draw_err)?;
    chart
        .configure_mesh()
        .light_line_style(WHITE)
        .label_style(("sans-serif", 16))
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()
        .map_err(draw_err)?;
    Ok(chart)
}
