// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::ffi::CString;
use std::os::raw::c_char;

use approx::assert_abs_diff_eq;
use fitsio::{errors::check_status, FitsFile};
use tempfile::TempDir;

use super::*;

const TEST_FREQ: f64 = 2.3e11;
const TEST_JD_ZERO: f64 = 2_457_849.5;

/// One random group: [UU, VV, WW, BASELINE, DATE] followed by the COMPLEX x
/// STOKES data (re, im, weight for each of RR, LL, RL, LR).
type Group = [f32; 17];

/// Write a single-channel random-groups file with an AIPS AN table for the
/// stations AA (NOSTA 1) and LM (NOSTA 2). Derived from cotter's uvfits
/// writing, like the reader is.
fn write_test_uvfits(path: &std::path::Path, groups: &[Group]) {
    let mut status = 0;
    let c_filename = CString::new(path.to_str().unwrap()).unwrap();
    let mut fptr = std::ptr::null_mut();
    unsafe {
        // ffinit = fits_create_file
        fitsio_sys::ffinit(
            &mut fptr as *mut *mut _, /* O - FITS file pointer                   */
            c_filename.as_ptr(),      /* I - name of file to create              */
            &mut status,              /* IO - error status                       */
        );
    }
    check_status(status).unwrap();

    // NAXIS1 = 0 makes this a random-groups file; ffphpr writes GROUPS = T.
    // -32 means FLOAT_IMG.
    let mut naxes = [0_i64, 3, 4, 1, 1, 1];
    unsafe {
        // ffphpr = fits_write_grphdr
        fitsio_sys::ffphpr(
            fptr,                 /* I - FITS file pointer                        */
            1,                    /* I - does file conform to FITS standard? 1/0  */
            -32,                  /* I - number of bits per data value pixel      */
            naxes.len() as i32,   /* I - number of axes in the data array         */
            naxes.as_mut_ptr(),   /* I - length of each data axis                 */
            5,                    /* I - number of group parameters (usually 0)   */
            groups.len() as i64,  /* I - number of random groups (usually 1 or 0) */
            1,                    /* I - may FITS file have extensions?           */
            &mut status,          /* IO - error status                            */
        );
    }
    check_status(status).unwrap();
    unsafe {
        fitsio_sys::ffclos(fptr, &mut status);
    }
    check_status(status).unwrap();

    let mut u = FitsFile::edit(path).unwrap();
    let hdu = u.hdu(0).unwrap();
    for (i, &param) in ["UU---SIN", "VV---SIN", "WW---SIN", "BASELINE", "DATE"]
        .iter()
        .enumerate()
    {
        let ii = i + 1;
        hdu.write_key(&mut u, &format!("PTYPE{ii}"), param).unwrap();
        hdu.write_key(&mut u, &format!("PSCAL{ii}"), 1.0).unwrap();
        let pzero = if param == "DATE" { TEST_JD_ZERO } else { 0.0 };
        hdu.write_key(&mut u, &format!("PZERO{ii}"), pzero).unwrap();
    }

    hdu.write_key(&mut u, "CTYPE2", "COMPLEX").unwrap();
    hdu.write_key(&mut u, "CRVAL2", 1.0).unwrap();
    hdu.write_key(&mut u, "CRPIX2", 1.0).unwrap();
    hdu.write_key(&mut u, "CTYPE3", "STOKES").unwrap();
    hdu.write_key(&mut u, "CRVAL3", -1.0).unwrap();
    hdu.write_key(&mut u, "CRPIX3", 1.0).unwrap();
    hdu.write_key(&mut u, "CTYPE4", "FREQ").unwrap();
    hdu.write_key(&mut u, "CRVAL4", TEST_FREQ).unwrap();
    hdu.write_key(&mut u, "CDELT4", 4e9).unwrap();
    hdu.write_key(&mut u, "CRPIX4", 1.0).unwrap();
    hdu.write_key(&mut u, "OBSRA", 266.416837).unwrap();
    hdu.write_key(&mut u, "OBSDEC", -29.007810).unwrap();
    hdu.write_key(&mut u, "OBJECT", "SgrA*").unwrap();

    for (i_group, group) in groups.iter().enumerate() {
        let mut row = *group;
        unsafe {
            // ffpgpe = fits_write_grppar_flt
            fitsio_sys::ffpgpe(
                u.as_raw(),          /* I - FITS file pointer                      */
                i_group as i64 + 1,  /* I - group to write (1 = 1st group)         */
                1,                   /* I - first vector element to write (1 = 1st)*/
                row.len() as i64,    /* I - number of values to write              */
                row.as_mut_ptr(),    /* I - array of values that are written       */
                &mut status,         /* IO - error status                          */
            );
        }
        check_status(status).unwrap();
    }

    // The AIPS AN table only needs the two columns the reader looks at.
    let mut c_col_names: Vec<*mut c_char> = ["ANNAME", "NOSTA"]
        .iter()
        .map(|&s| CString::new(s).unwrap().into_raw())
        .collect();
    let mut c_col_formats: Vec<*mut c_char> = ["8A", "1J"]
        .iter()
        .map(|&s| CString::new(s).unwrap().into_raw())
        .collect();
    let mut c_col_units: Vec<*mut c_char> = ["", ""]
        .iter()
        .map(|&s| CString::new(s).unwrap().into_raw())
        .collect();
    let extname = CString::new("AIPS AN").unwrap();
    unsafe {
        // ffcrtb = fits_create_tbl; BINARY_TBL is 2.
        fitsio_sys::ffcrtb(
            u.as_raw(),                 /* I - FITS file pointer                        */
            2,                          /* I - type of table to create                  */
            0,                          /* I - number of rows in the table              */
            2,                          /* I - number of columns in the table           */
            c_col_names.as_mut_ptr(),   /* I - name of each column                      */
            c_col_formats.as_mut_ptr(), /* I - value of TFORMn keyword for each column  */
            c_col_units.as_mut_ptr(),   /* I - value of TUNITn keyword for each column  */
            extname.as_ptr(),           /* I - value of EXTNAME keyword, if any         */
            &mut status,                /* IO - error status                            */
        );
    }
    check_status(status).unwrap();
    u.hdu(1).unwrap();

    for (i, &(name, nosta)) in [("AA", 1_i32), ("LM", 2)].iter().enumerate() {
        let row = i as i64 + 1;
        let c_name = CString::new(name).unwrap();
        unsafe {
            // ANNAME. ffpcls = fits_write_col_str
            fitsio_sys::ffpcls(
                u.as_raw(),                       /* I - FITS file pointer                       */
                1,                                /* I - number of column to write (1 = 1st col) */
                row,                              /* I - first row to write (1 = 1st row)        */
                1,                                /* I - first vector element to write (1 = 1st) */
                1,                                /* I - number of strings to write              */
                [c_name.into_raw()].as_mut_ptr(), /* I - array of pointers to strings            */
                &mut status,                      /* IO - error status                           */
            );
        }
        check_status(status).unwrap();
        unsafe {
            // NOSTA. ffpclk = fits_write_col_int
            fitsio_sys::ffpclk(
                u.as_raw(),            /* I - FITS file pointer                       */
                2,                     /* I - number of column to write (1 = 1st col) */
                row,                   /* I - first row to write (1 = 1st row)        */
                1,                     /* I - first vector element to write (1 = 1st) */
                1,                     /* I - number of values to write               */
                [nosta].as_mut_ptr(),  /* I - array of values to write                */
                &mut status,           /* IO - error status                           */
            );
        }
        check_status(status).unwrap();
    }
}

#[test]
fn reader_converts_correlations_and_drops_bad_groups() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.uvfits");
    let groups: Vec<Group> = vec![
        // AA-LM (baseline 256*1+2), 6 h into the day.
        [
            1e-2, 5e-3, 0.0, 258.0, 0.25, //
            1.0, 0.5, 4.0, // RR
            0.8, 0.3, 4.0, // LL
            0.1, 0.05, 4.0, // RL
            0.06, 0.01, 4.0, // LR
        ],
        // The same baseline recorded as LM-AA (256*2+1): the reader must
        // swap the antennas, conjugate, exchange the cross hands and negate
        // the baseline vector.
        [
            1e-2, 2e-3, 0.0, 513.0, 0.5, //
            0.5, -0.2, 2.0, // RR
            0.5, 0.2, 2.0, // LL
            0.2, 0.1, 2.0, // RL
            0.3, -0.1, 2.0, // LR
        ],
        // A NaN real part poisons RR: no parallel-hand weight, dropped.
        [
            1e-2, 5e-3, 0.0, 258.0, 0.75, //
            f32::NAN, 0.5, 4.0, //
            0.8, 0.3, 4.0, //
            0.0, 0.0, 4.0, //
            0.0, 0.0, 4.0, //
        ],
        // LL flagged (zero weight): Stokes I needs both hands, dropped.
        [
            1e-2, 5e-3, 0.0, 258.0, 0.8, //
            1.0, 0.5, 4.0, //
            0.8, 0.3, 0.0, //
            0.0, 0.0, 4.0, //
            0.0, 0.0, 4.0, //
        ],
    ];
    write_test_uvfits(&path, &groups);

    let obs = read_uvfits(&path).unwrap();

    assert_eq!(obs.stations.len(), 2);
    assert_eq!(obs.stations[0].name, "AA");
    assert_eq!(obs.stations[1].name, "LM");
    // SEFDs come from the built-in EHT 2017 table.
    assert_abs_diff_eq!(obs.stations[0].sefd, 90.0);
    assert_abs_diff_eq!(obs.stations[1].sefd, 600.0);

    assert_abs_diff_eq!(obs.freq, TEST_FREQ);
    assert_abs_diff_eq!(obs.bandwidth, 4e9);
    assert_abs_diff_eq!(obs.mjd, 57849.0);
    assert_abs_diff_eq!(obs.pos.ra_degrees(), 266.416837, epsilon = 1e-8);
    assert_abs_diff_eq!(obs.pos.dec_degrees(), -29.007810, epsilon = 1e-8);

    // Two of the four groups survive.
    assert_eq!(obs.vis.len(), 2);

    let v1 = &obs.vis[0];
    assert_eq!((v1.ant1, v1.ant2), (0, 1));
    assert_abs_diff_eq!(v1.time, 0.25 * 86400.0, epsilon = 1e-3);
    // u,v arrive in seconds and are scaled to wavelengths.
    assert_abs_diff_eq!(v1.uu, 1e-2 * TEST_FREQ, epsilon = 1e4);
    assert_abs_diff_eq!(v1.vv, 5e-3 * TEST_FREQ, epsilon = 1e4);
    // I = (RR + LL)/2, Q = (RL + LR)/2, U = (RL - LR)/2i.
    assert_abs_diff_eq!(v1.i.re, 0.9, epsilon = 1e-6);
    assert_abs_diff_eq!(v1.i.im, 0.4, epsilon = 1e-6);
    assert_abs_diff_eq!(v1.q.re, 0.08, epsilon = 1e-6);
    assert_abs_diff_eq!(v1.q.im, 0.03, epsilon = 1e-6);
    assert_abs_diff_eq!(v1.u.re, 0.02, epsilon = 1e-6);
    assert_abs_diff_eq!(v1.u.im, -0.02, epsilon = 1e-6);
    // Weights are 1/sigma^2 per correlation.
    assert_abs_diff_eq!(v1.sigma, 0.5 * (0.25_f64 + 0.25).sqrt(), epsilon = 1e-6);

    // The reversed baseline comes out in canonical antenna order.
    let v2 = &obs.vis[1];
    assert_eq!((v2.ant1, v2.ant2), (0, 1));
    assert_abs_diff_eq!(v2.time, 0.5 * 86400.0, epsilon = 1e-3);
    assert_abs_diff_eq!(v2.uu, -1e-2 * TEST_FREQ, epsilon = 1e4);
    assert_abs_diff_eq!(v2.vv, -2e-3 * TEST_FREQ, epsilon = 1e4);
    assert_abs_diff_eq!(v2.i.re, 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(v2.i.im, 0.0, epsilon = 1e-6);
    // Q from the swapped, conjugated cross hands: (LR* + RL*)/2.
    assert_abs_diff_eq!(v2.q.re, 0.25, epsilon = 1e-6);
    assert_abs_diff_eq!(v2.q.im, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(v2.u.re, 0.1, epsilon = 1e-6);
    assert_abs_diff_eq!(v2.u.im, -0.05, epsilon = 1e-6);
    assert_abs_diff_eq!(v2.sigma, 0.5, epsilon = 1e-6);
}

#[test]
fn reader_rejects_a_plain_image_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("image.fits");
    let description = fitsio::images::ImageDescription {
        data_type: fitsio::images::ImageType::Double,
        dimensions: &[2, 2],
    };
    FitsFile::create(&path)
        .with_custom_primary(&description)
        .open()
        .unwrap();
    let result = read_uvfits(&path);
    assert!(matches!(
        result,
        Err(UvfitsReadError::NotRandomGroups { .. })
    ));
}

#[test]
fn reader_errors_when_every_group_is_flagged() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flagged.uvfits");
    let groups: Vec<Group> = vec![[
        1e-2, 5e-3, 0.0, 258.0, 0.25, //
        1.0, 0.5, 0.0, //
        0.8, 0.3, 0.0, //
        0.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, //
    ]];
    write_test_uvfits(&path, &groups);
    let result = read_uvfits(&path);
    assert!(matches!(result, Err(UvfitsReadError::NoVisibilities { .. })));
}
