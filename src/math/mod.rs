// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Some helper mathematics.


use ndarray::prelude::*;
use num_complex::Complex64;

/// Complex exponential. The argument is assumed to be purely imaginary.
///
/// This function doesn't actually use complex numbers; it just returns the
/// real and imag components from Euler's formula (i.e. e^{ix} = cos{x} + i
/// sin{x}).
#[inline]
pub(crate) fn cexp(x: f64) -> Complex64 {
    let (im, re) = x.sin_cos();
    Complex64::new(re, im)
}

/// Wrap a closure-phase difference \[degrees\] into (-180, 180].
///
/// A difference of exactly +180 stays +180; exactly -180 maps to +180. Either
/// way the magnitude used by chi-squared is 180.
#[inline]
pub(crate) fn wrap_cphase(diff_deg: f64) -> f64 {
    let mut d = diff_deg % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// The median of a slice. NaNs are ignored. Returns NaN for an empty (or
/// all-NaN) slice.
pub(crate) fn median(values: &[f64]) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_unstable_by(|a, b| a.partial_cmp(b).expect("no NaNs left"));
    let n = finite.len();
    if n % 2 == 1 {
        finite[n / 2]
    } else {
        (finite[n / 2 - 1] + finite[n / 2]) / 2.0
    }
}

/// The population standard deviation of a slice.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if n < 1.0 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Sample a 2D grid at a fractional position with bilinear interpolation.
/// Out-of-bounds positions return 0; the image is treated as embedded in
/// blank sky.
pub(crate) fn bilinear(grid: ArrayView2<f64>, x: f64, y: f64) -> f64 {
    let (ny, nx) = grid.dim();
    if x < 0.0 || y < 0.0 || x > (nx - 1) as f64 || y > (ny - 1) as f64 {
        return 0.0;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(nx - 1);
    let y1 = (y0 + 1).min(ny - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;
    grid[(y0, x0)] * (1.0 - fx) * (1.0 - fy)
        + grid[(y0, x1)] * fx * (1.0 - fy)
        + grid[(y1, x0)] * (1.0 - fx) * fy
        + grid[(y1, x1)] * fx * fy
}
