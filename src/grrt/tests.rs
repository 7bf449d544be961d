// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::io::Write;

use approx::assert_abs_diff_eq;
use indoc::indoc;
use tempfile::NamedTempFile;

use super::*;
use crate::constants::RAD_PER_UAS;

fn write_fixture(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("couldn't make a temp file");
    file.write_all(contents.as_bytes())
        .expect("couldn't write the fixture");
    file.flush().expect("couldn't flush the fixture");
    file
}

#[test]
fn ipole_unpolarised_grid_reads_and_transposes() {
    // A 2x2 grid; column 2 is the intensity. The file's fastest axis becomes
    // the image's first axis.
    let file = write_fixture(indoc! {"
        0 0 1.0
        0 1 2.0
        1 0 3.0
        1 1 4.0
    "});
    let image = read_ipole(file.path(), 2.5).unwrap();
    assert_eq!(image.dim(), 2);
    let i = image.stokes.index_axis(Axis(0), 0);
    assert_abs_diff_eq!(i[(0, 0)], 1.0);
    assert_abs_diff_eq!(i[(1, 0)], 2.0);
    assert_abs_diff_eq!(i[(0, 1)], 3.0);
    assert_abs_diff_eq!(i[(1, 1)], 4.0);
    assert_abs_diff_eq!(image.total_flux(), 10.0);
    assert_abs_diff_eq!(image.pixel_size, 2.5 * RAD_PER_UAS);
    // Q/U/V untouched.
    assert_abs_diff_eq!(image.stokes.index_axis(Axis(0), 1).sum(), 0.0);
}

#[test]
fn ipole_polarised_grid_fills_all_stokes() {
    let file = write_fixture(indoc! {"
        0 0 9.9 1.0 0.1 0.2 0.3
        0 1 9.9 2.0 0.2 0.3 0.4
        1 0 9.9 3.0 0.3 0.4 0.5
        1 1 9.9 4.0 0.4 0.5 0.6
    "});
    let image = read_ipole(file.path(), 1.0).unwrap();
    assert_abs_diff_eq!(image.total_flux(), 10.0);
    assert_abs_diff_eq!(image.stokes.index_axis(Axis(0), 1).sum(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(image.stokes.index_axis(Axis(0), 2).sum(), 1.4, epsilon = 1e-12);
    assert_abs_diff_eq!(image.stokes.index_axis(Axis(0), 3).sum(), 1.8, epsilon = 1e-12);
    // Transposition applies to every plane.
    assert_abs_diff_eq!(image.stokes[(1, 1, 0)], 0.2);
}

#[test]
fn ipole_non_square_grid_is_an_error() {
    let file = write_fixture(indoc! {"
        0 0 1.0
        0 1 2.0
        1 0 3.0
    "});
    let result = read_ipole(file.path(), 1.0);
    assert!(matches!(result, Err(GrrtReadError::NotSquare { rows: 3, .. })));
}

#[test]
fn ipole_garbage_reports_line_and_text() {
    let file = write_fixture(indoc! {"
        0 0 1.0
        0 1 oops
        1 0 3.0
        1 1 4.0
    "});
    let err = read_ipole(file.path(), 1.0).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("line 2"), "{msg}");
    assert!(msg.contains("oops"), "{msg}");
}

/// A tiny 3x3 BHOSS file: half-width 30 r_g, no offset, two frequencies.
const BHOSS_3X3: &str = indoc! {"
    30.0 0.0 3 2
    1000.0 60.0 0.0 0.9375 1.0e30 2.0
    8.6e10 2.3e11
    1 1 0.0 0.5
    1 2 0.0 0.0
    1 3 0.0 0.0
    2 1 0.0 0.0
    2 2 0.0 1.0
    2 3 0.0 0.0
    3 1 0.0 0.0
    3 2 0.0 0.0
    3 3 0.0 0.25
"};

#[test]
fn bhoss_header_parses() {
    let file = write_fixture(BHOSS_3X3);
    let header = read_bhoss_header(file.path()).unwrap();
    assert_abs_diff_eq!(header.width, 30.0);
    assert_eq!(header.resolution, 3);
    assert_abs_diff_eq!(header.spin, 0.9375);
    assert_abs_diff_eq!(header.jansky_corr, 2.0);
    assert_eq!(header.freqs.len(), 2);
    assert_abs_diff_eq!(header.freqs[1], 2.3e11);
}

#[test]
fn bhoss_selects_the_right_frequency_column_and_scales_to_jy() {
    let file = write_fixture(BHOSS_3X3);
    let uas_per_rg = 5.04975;
    let image = read_bhoss(file.path(), 2.3e11, uas_per_rg).unwrap();
    assert_eq!(image.dim(), 3);
    // The second frequency column, times Jansky_corr = 2.
    assert_abs_diff_eq!(image.total_flux(), 2.0 * 1.75, epsilon = 1e-12);
    assert_abs_diff_eq!(image.stokes[(0, 1, 1)], 2.0);

    // Pixel grid spans 2*width in r_g over M pixels.
    let expected_dx_uas = uas_per_rg * 2.0 * 30.0 / 3.0;
    assert_abs_diff_eq!(
        image.pixel_size,
        expected_dx_uas * RAD_PER_UAS,
        epsilon = 1e-18
    );
}

#[test]
fn bhoss_missing_frequency_lists_available_ones() {
    let file = write_fixture(BHOSS_3X3);
    let err = read_bhoss(file.path(), 1.5e11, 5.04975).unwrap_err();
    match &err {
        GrrtReadError::FreqNotInFile { freq, available } => {
            assert_abs_diff_eq!(*freq, 1.5e11);
            assert_eq!(available.len(), 2);
        }
        other => panic!("expected FreqNotInFile, got {other:?}"),
    }
    let msg = err.to_string();
    assert!(msg.contains("8.6e10") || msg.contains("86000000000"), "{msg}");
}

#[test]
fn bhoss_truncated_header_is_an_error() {
    let file = write_fixture("30.0 0.0 3 2\n");
    let result = read_bhoss_header(file.path());
    assert!(matches!(
        result,
        Err(GrrtReadError::MissingBhossHeader { .. })
    ));
}

#[test]
fn missing_file_is_an_error() {
    let result = read_ipole(Path::new("/does/not/exist.dat"), 1.0);
    assert!(matches!(result, Err(GrrtReadError::BadFile(_))));
}
