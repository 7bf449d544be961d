// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading of random-groups UV-FITS visibility files, as produced by AIPS and
//! the EHT correlation pipeline.

mod error;
#[cfg(test)]
mod tests;

pub(crate) use error::UvfitsReadError;

use std::path::Path;

use log::{debug, info, trace, warn};
use num_complex::Complex64;

use crate::{
    constants::{eht2017_station, SEFD_FALLBACK},
    coord::RADec,
    io::fits::{
        fits_get_col, fits_get_optional_key, fits_get_required_key, fits_open, fits_open_hdu,
        fits_read_group_data, fits_read_group_params,
    },
    obs::{Obsdata, Station, Visibility},
};

/// Indices (0-based) of the random-group parameters we care about, along with
/// their linear scalings.
struct GroupParams {
    uu: usize,
    vv: usize,
    baseline: usize,
    /// Both DATE params, when the Julian date is split over two.
    dates: Vec<usize>,
    scales: Vec<(f64, f64)>,
}

impl GroupParams {
    fn value(&self, params: &[f32], i: usize) -> f64 {
        let (scale, zero) = self.scales[i];
        params[i] as f64 * scale + zero
    }

    fn date(&self, params: &[f32]) -> f64 {
        self.dates.iter().map(|&i| self.value(params, i)).sum()
    }
}

/// Read an EHT observation out of a random-groups UV-FITS file.
///
/// The four correlation products (RR, LL, RL, LR) are converted to Stokes I,
/// Q and U; multi-channel data are averaged over the frequency axis on load;
/// samples with non-positive weights or NaN components are dropped. Station
/// SEFDs are overlaid from the built-in EHT 2017 table by site code.
pub(crate) fn read_uvfits(file: &Path) -> Result<Obsdata, UvfitsReadError> {
    let mut fptr = fits_open(file)?;
    let hdu = fits_open_hdu(&mut fptr, 0)?;
    let boxed_file = || file.to_path_buf().into_boxed_path();

    let groups: String =
        fits_get_optional_key(&mut fptr, &hdu, "GROUPS")?.unwrap_or_else(|| "F".to_string());
    if groups != "T" && groups != "true" {
        return Err(UvfitsReadError::NotRandomGroups { file: boxed_file() });
    }
    let num_groups: usize = fits_get_required_key(&mut fptr, &hdu, "GCOUNT")?;
    let num_params: usize = fits_get_required_key(&mut fptr, &hdu, "PCOUNT")?;
    let num_axes: usize = fits_get_required_key(&mut fptr, &hdu, "NAXIS")?;

    // Axis layout (fastest first): COMPLEX (re, im, weight), STOKES, FREQ,
    // then degenerate IF/RA/DEC axes.
    let mut axes = Vec::with_capacity(num_axes - 1);
    for i_axis in 2..=num_axes {
        axes.push(fits_get_required_key::<usize>(
            &mut fptr,
            &hdu,
            &format!("NAXIS{i_axis}"),
        )?);
    }
    let group_size: usize = axes.iter().product();
    if axes.first() != Some(&3) {
        return Err(UvfitsReadError::BadComplexAxis {
            file: boxed_file(),
            found: axes.first().copied().unwrap_or(0),
        });
    }
    let num_pols = axes.get(1).copied().unwrap_or(1);
    if num_pols != 4 {
        return Err(UvfitsReadError::BadStokesAxis {
            file: boxed_file(),
            found: num_pols,
        });
    }
    let num_chans = axes.get(2).copied().unwrap_or(1);
    debug!("uvfits axes {axes:?}: {num_chans} channels, {num_groups} groups");

    let freq: f64 = fits_get_required_key(&mut fptr, &hdu, "CRVAL4")?;
    let bandwidth: f64 = fits_get_optional_key::<f64>(&mut fptr, &hdu, "CDELT4")?
        .unwrap_or(0.0)
        .abs()
        * num_chans as f64;
    let obsra: f64 = fits_get_required_key(&mut fptr, &hdu, "OBSRA")?;
    let obsdec: f64 = fits_get_required_key(&mut fptr, &hdu, "OBSDEC")?;

    // Match the group parameters by PTYPE. UU and VV may carry projection
    // suffixes ("UU---SIN"); DATE may be split into two params.
    let mut uu = None;
    let mut vv = None;
    let mut baseline = None;
    let mut dates = vec![];
    let mut scales = Vec::with_capacity(num_params);
    for i_param in 1..=num_params {
        let ptype: String =
            fits_get_optional_key(&mut fptr, &hdu, &format!("PTYPE{i_param}"))?
                .unwrap_or_default();
        let pscal: f64 =
            fits_get_optional_key(&mut fptr, &hdu, &format!("PSCAL{i_param}"))?.unwrap_or(1.0);
        let pzero: f64 =
            fits_get_optional_key(&mut fptr, &hdu, &format!("PZERO{i_param}"))?.unwrap_or(0.0);
        scales.push((pscal, pzero));
        match ptype.trim() {
            t if t.starts_with("UU") => uu = uu.or(Some(i_param - 1)),
            t if t.starts_with("VV") => vv = vv.or(Some(i_param - 1)),
            t if t.starts_with("BASELINE") => baseline = baseline.or(Some(i_param - 1)),
            t if t.starts_with("DATE") => dates.push(i_param - 1),
            t => trace!("ignoring group param {t}"),
        }
    }
    let params = GroupParams {
        uu: uu.ok_or(UvfitsReadError::MissingGroupParam {
            file: boxed_file(),
            param: "UU",
        })?,
        vv: vv.ok_or(UvfitsReadError::MissingGroupParam {
            file: boxed_file(),
            param: "VV",
        })?,
        baseline: baseline.ok_or(UvfitsReadError::MissingGroupParam {
            file: boxed_file(),
            param: "BASELINE",
        })?,
        dates,
        scales,
    };
    if params.dates.is_empty() {
        return Err(UvfitsReadError::MissingGroupParam {
            file: boxed_file(),
            param: "DATE",
        });
    }

    let (stations, nosta_to_index) = read_antenna_table(&mut fptr, file)?;
    // The AN table moved the HDU pointer; go back to the groups.
    let hdu = fits_open_hdu(&mut fptr, 0)?;

    let mut vis = vec![];
    let mut param_buf = vec![0.0_f32; num_params];
    let mut data_buf = vec![0.0_f32; group_size];
    let mut mjd_ref: Option<f64> = None;
    let mut num_dropped = 0;
    for i_group in 0..num_groups {
        fits_read_group_params(&mut fptr, &hdu, i_group as i64, &mut param_buf)?;
        fits_read_group_data(&mut fptr, &hdu, i_group as i64, &mut data_buf)?;

        let jd = params.date(&param_buf);
        let mjd = jd - 2_400_000.5;
        let day0 = *mjd_ref.get_or_insert_with(|| mjd.floor());
        let time = (mjd - day0) * 86400.0;

        // AIPS convention: baseline = 256*ant1 + ant2, antenna numbers being
        // NOSTA values.
        let bl = params.value(&param_buf, params.baseline).round() as usize;
        let (nosta1, nosta2) = (bl / 256, bl % 256);
        let lookup = |nosta: usize| {
            nosta_to_index
                .iter()
                .find(|&&(n, _)| n == nosta)
                .map(|&(_, i)| i)
                .ok_or(UvfitsReadError::UnknownAntenna {
                    file: boxed_file(),
                    nosta,
                })
        };
        let (mut ant1, mut ant2) = (lookup(nosta1)?, lookup(nosta2)?);
        let mut conjugate = false;
        if ant1 > ant2 {
            std::mem::swap(&mut ant1, &mut ant2);
            conjugate = true;
        }

        // u,v are in seconds; multiply by the frequency for wavelengths.
        let uu = params.value(&param_buf, params.uu) * freq;
        let vv = params.value(&param_buf, params.vv) * freq;

        // Average the correlations over the frequency axis, honouring
        // weights. Correlation order on the STOKES axis: RR, LL, RL, LR.
        let mut corrs = [Complex64::new(0.0, 0.0); 4];
        let mut weights = [0.0_f64; 4];
        for i_chan in 0..num_chans {
            for i_pol in 0..4 {
                let i0 = ((i_chan * 4) + i_pol) * 3;
                let (re, im, w) = (
                    data_buf[i0] as f64,
                    data_buf[i0 + 1] as f64,
                    data_buf[i0 + 2] as f64,
                );
                if w > 0.0 && re.is_finite() && im.is_finite() {
                    corrs[i_pol] += w * Complex64::new(re, im);
                    weights[i_pol] += w;
                }
            }
        }
        // Stokes I needs both parallel hands.
        if weights[0] <= 0.0 || weights[1] <= 0.0 {
            num_dropped += 1;
            continue;
        }
        for i_pol in 0..4 {
            if weights[i_pol] > 0.0 {
                corrs[i_pol] /= weights[i_pol];
            }
        }
        if conjugate {
            // Swapping the antenna order conjugates the correlations and
            // flips the baseline vector; the cross hands also swap.
            corrs = [
                corrs[0].conj(),
                corrs[1].conj(),
                corrs[3].conj(),
                corrs[2].conj(),
            ];
        }
        let (uu, vv) = if conjugate { (-uu, -vv) } else { (uu, vv) };

        let [rr, ll, rl, lr] = corrs;
        let i = (rr + ll) / 2.0;
        let q = (rl + lr) / 2.0;
        let u = (rl - lr) / Complex64::new(0.0, 2.0);
        // Weights are 1/sigma^2 per correlation.
        let sigma = 0.5 * (1.0 / weights[0] + 1.0 / weights[1]).sqrt();
        if !i.is_finite() || !sigma.is_finite() {
            num_dropped += 1;
            continue;
        }

        vis.push(Visibility {
            time,
            ant1,
            ant2,
            i,
            q,
            u,
            sigma,
            uu,
            vv,
        });
    }
    if num_dropped > 0 {
        warn!("Dropped {num_dropped} flagged or NaN visibilities on load");
    }
    if vis.is_empty() {
        return Err(UvfitsReadError::NoVisibilities { file: boxed_file() });
    }
    vis.sort_unstable_by(|a, b| {
        a.time
            .total_cmp(&b.time)
            .then(a.ant1.cmp(&b.ant1))
            .then(a.ant2.cmp(&b.ant2))
    });

    info!(
        "Read {} visibilities on {} stations at {:.1} GHz",
        vis.len(),
        stations.len(),
        freq / 1e9
    );
    Ok(Obsdata {
        stations,
        vis,
        pos: RADec::from_degrees(obsra, obsdec),
        freq,
        bandwidth,
        mjd: mjd_ref.unwrap_or_default(),
    })
}

/// Read the AIPS AN table: station names in order, plus the mapping from the
/// table's antenna numbers (NOSTA) to indices into that list. SEFDs come from
/// the built-in EHT 2017 table, with a conservative fallback for unknown
/// sites.
fn read_antenna_table(
    fptr: &mut fitsio::FitsFile,
    file: &Path,
) -> Result<(Vec<Station>, Vec<(usize, usize)>), UvfitsReadError> {
    let an_hdu = fits_open_hdu(fptr, "AIPS AN").map_err(|_| UvfitsReadError::MissingAntennaTable {
        file: file.to_path_buf().into_boxed_path(),
    })?;
    let names: Vec<String> = fits_get_col(fptr, &an_hdu, "ANNAME")?;
    let nostas: Vec<i32> = fits_get_col(fptr, &an_hdu, "NOSTA")?;

    let stations: Vec<Station> = names
        .iter()
        .map(|name| {
            let code = name.trim().to_string();
            let sefd = match eht2017_station(&code) {
                Some((sefd, _, _)) => sefd,
                None => {
                    warn!("Station {code} has no tabulated SEFD; assuming {SEFD_FALLBACK} Jy");
                    SEFD_FALLBACK
                }
            };
            Station { name: code, sefd }
        })
        .collect();
    let nosta_to_index = nostas
        .iter()
        .enumerate()
        .map(|(i, &nosta)| (nosta as usize, i))
        .collect();
    debug!(
        "AIPS AN table: {:?}",
        stations.iter().map(|s| &s.name).collect::<Vec<_>>()
    );
    Ok((stations, nosta_to_index))
}
