// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;
use tempfile::TempDir;

use super::*;
use crate::constants::RAD_PER_UAS;

fn test_image(dim: usize) -> ModelImage {
    let mut stokes = Array3::zeros((4, dim, dim));
    stokes[(0, dim / 2, dim / 2)] = 1.0;
    ModelImage {
        stokes,
        pixel_size: 2.0 * RAD_PER_UAS,
        source: "SgrA*".to_string(),
        pos: RADec::from_degrees(266.416837, -29.007810),
        freq: 2.3e11,
        mjd: 57850.0,
    }
}

#[test]
fn scaling_hits_the_target_flux() {
    let mut image = test_image(4);
    image.stokes[(0, 0, 0)] = 3.0;
    image.stokes[(1, 0, 0)] = 0.4;
    let scaled = image.scaled_to_flux(2.0);
    assert_abs_diff_eq!(scaled.total_flux(), 2.0, epsilon = 1e-12);
    // Q scales by the same factor (2/4).
    assert_abs_diff_eq!(scaled.stokes[(1, 0, 0)], 0.2, epsilon = 1e-12);
    // The original is untouched.
    assert_abs_diff_eq!(image.total_flux(), 4.0);
}

#[test]
fn rotation_by_quarter_turn_moves_an_off_centre_pixel() {
    let mut image = test_image(3);
    image.stokes[(0, 1, 1)] = 0.0;
    image.stokes[(0, 1, 0)] = 1.0; // left of centre
    let rotated = image.rotated(90.0);
    assert_abs_diff_eq!(rotated.stokes[(0, 0, 1)], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(rotated.total_flux(), 1.0, epsilon = 1e-12);
}

#[test]
fn rotation_by_half_turn_is_a_point_reflection() {
    let mut image = test_image(5);
    image.stokes[(0, 0, 1)] = 0.5;
    let rotated = image.rotated(180.0);
    assert_abs_diff_eq!(rotated.stokes[(0, 4, 3)], 0.5, epsilon = 1e-12);
    // The central pixel stays put.
    assert_abs_diff_eq!(rotated.stokes[(0, 2, 2)], 1.0, epsilon = 1e-12);
}

#[test]
fn rotation_keeps_the_centre_pixel_fixed_for_any_angle() {
    let image = test_image(5);
    for pa in [0.0, 17.3, 45.0, -120.0] {
        let rotated = image.rotated(pa);
        assert_abs_diff_eq!(rotated.stokes[(0, 2, 2)], 1.0, epsilon = 1e-9);
    }
}

#[test]
fn fits_round_trip_preserves_header_and_pixels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("model.fits");
    let image = test_image(8);
    image
        .write_fits(&path, "GRRT2fits", Some("converted from ipole"))
        .unwrap();

    let read = ModelImage::read_fits(&path).unwrap();
    assert_eq!(read.dim(), 8);
    assert_eq!(read.source, "SgrA*");
    assert_abs_diff_eq!(read.pos.ra_degrees(), 266.416837, epsilon = 1e-8);
    assert_abs_diff_eq!(read.pos.dec_degrees(), -29.007810, epsilon = 1e-8);
    assert_abs_diff_eq!(read.freq, 2.3e11);
    assert_abs_diff_eq!(read.mjd, 57850.0);
    assert_abs_diff_eq!(read.pixel_size, image.pixel_size, epsilon = 1e-18);
    assert_abs_diff_eq!(read.total_flux(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(read.stokes[(0, 4, 4)], 1.0, epsilon = 1e-12);
}

#[test]
fn mjd_from_date_matches_known_epoch() {
    // 2017 April 6, the first M87 EHT observing day.
    assert_abs_diff_eq!(mjd_from_date("2017-04-06").unwrap(), 57849.0);
}
