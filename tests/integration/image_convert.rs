// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests for the image-convert subcommand.

use std::fs::File;
use std::io::Write;

use approx::assert_abs_diff_eq;
use indoc::indoc;
use tempfile::tempdir;

use crate::{eht_imfit, get_cmd_output};

/// An unpolarised 2x2 ipole image: columns are (i, j, I).
const IPOLE_2X2: &str = indoc! {"
    0 0 1.0
    0 1 2.0
    1 0 3.0
    1 1 4.0
"};

#[test]
fn image_convert_writes_a_readable_fits_image() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("model.dat");
    let mut fh = File::create(&input).unwrap();
    write!(fh, "{IPOLE_2X2}").unwrap();
    drop(fh);
    let output = dir.path().join("model.fits");

    let cmd = eht_imfit()
        .arg("image-convert")
        .arg(&input)
        .args(["--format", "ipole"])
        .args(["--source", "SgrA*"])
        .args(["--freq", "230e9"])
        .args(["--pixel-size", "2.0"])
        .args(["--date", "2017-04-06"])
        .arg("--output")
        .arg(&output)
        .arg("--no-progress-bars")
        .ok();
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("image-convert"), "{stdout}");
    assert!(output.exists());

    let image = eht_imfit::image::ModelImage::read_fits(&output).unwrap();
    assert_eq!(image.dim(), 2);
    assert_eq!(image.source, "SgrA*");
    assert_abs_diff_eq!(image.total_flux(), 10.0, epsilon = 1e-10);
    assert_abs_diff_eq!(image.freq, 230e9);
    assert_abs_diff_eq!(image.mjd, 57849.0);
    assert_abs_diff_eq!(image.pos.ra_degrees(), 266.416837, epsilon = 1e-5);
    assert_abs_diff_eq!(image.pos.dec_degrees(), -29.007810, epsilon = 1e-5);
    assert_abs_diff_eq!(
        image.pixel_size,
        2.0 * eht_imfit::constants::RAD_PER_UAS,
        epsilon = 1e-18
    );
}

#[test]
fn image_convert_rejects_fits_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("model.fits");
    File::create(&input).unwrap();

    let cmd = eht_imfit()
        .arg("image-convert")
        .arg(&input)
        .args(["--format", "fits"])
        .args(["--source", "SgrA*"])
        .args(["--freq", "230e9"])
        .args(["--date", "2017-04-06"])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("already a FITS image"), "{stderr}");
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("model.dat");
    let mut fh = File::create(&input).unwrap();
    write!(fh, "{IPOLE_2X2}").unwrap();
    drop(fh);
    let output = dir.path().join("model.fits");

    let cmd = eht_imfit()
        .arg("image-convert")
        .arg(&input)
        .args(["--format", "ipole"])
        .args(["--source", "SgrA*"])
        .args(["--freq", "230e9"])
        .args(["--pixel-size", "2.0"])
        .args(["--date", "2017-04-06"])
        .arg("--output")
        .arg(&output)
        .arg("--dry-run")
        .ok();
    assert!(cmd.is_ok());
    assert!(!output.exists());
}
