// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interferometric observation data: visibility samples on baselines between
//! stations, and the derived products (scan averages, closure phases) the
//! fitting loop consumes.


use itertools::Itertools;
use log::debug;
use num_complex::Complex64;

use crate::coord::RADec;

/// Two timestamps closer than this \[seconds\] are the same integration.
const TIME_TOL: f64 = 1e-6;

/// A station participating in the observation.
#[derive(Debug, Clone)]
pub struct Station {
    /// The two-letter site code from the antenna table (e.g. "AA", "LM").
    pub name: String,

    /// System-equivalent flux density \[Jy\], already scaled by any
    /// user-supplied factor. Zero means the station adds no thermal noise.
    pub sefd: f64,
}

/// One complex visibility sample on one baseline at one time.
#[derive(Debug, Clone, Copy)]
pub struct Visibility {
    /// Seconds since the reference date.
    pub time: f64,

    /// Indices into the observation's station list. `ant1 < ant2`.
    pub ant1: usize,
    pub ant2: usize,

    /// Stokes I, Q and U correlations \[Jy\].
    pub i: Complex64,
    pub q: Complex64,
    pub u: Complex64,

    /// Thermal noise on the Stokes I component \[Jy\].
    pub sigma: f64,

    /// Baseline projection \[wavelengths\].
    pub uu: f64,
    pub vv: f64,
}

impl Visibility {
    /// Radial uv distance \[wavelengths\].
    pub fn uvdist(&self) -> f64 {
        self.uu.hypot(self.vv)
    }

    /// Linearly-polarized amplitude sqrt(Q² + U²) \[Jy\].
    pub fn pamp(&self) -> f64 {
        self.q.norm().hypot(self.u.norm())
    }
}

/// A closure phase on a triangle of stations at one time.
#[derive(Debug, Clone, Copy)]
pub struct ClosurePhase {
    pub time: f64,

    /// Station indices, in bispectrum order (12, 23, 31).
    pub triangle: [usize; 3],

    /// The bispectrum phase \[degrees\].
    pub cphase: f64,

    /// Linearized closure-phase uncertainty \[degrees\].
    pub sigma_cp: f64,

    /// The three baselines' uv coordinates \[wavelengths\].
    pub u: [f64; 3],
    pub v: [f64; 3],
}

impl ClosurePhase {
    /// The longest of the triangle's three baselines \[wavelengths\].
    pub fn max_uvdist(&self) -> f64 {
        (0..3)
            .map(|i| self.u[i].hypot(self.v[i]))
            .fold(0.0, f64::max)
    }
}

/// An observation: the station table, the visibility samples and the
/// observing setup.
#[derive(Debug, Clone)]
pub struct Obsdata {
    pub stations: Vec<Station>,
    pub vis: Vec<Visibility>,

    /// The phase centre.
    pub pos: RADec,

    /// Observing frequency \[Hz\].
    pub freq: f64,

    /// Bandwidth \[Hz\].
    pub bandwidth: f64,

    /// The reference modified Julian date.
    pub mjd: f64,
}

impl Obsdata {
    /// Station index by site code.
    pub fn station_index(&self, code: &str) -> Option<usize> {
        self.stations.iter().position(|s| s.name == code)
    }

    /// Partition the observation into scans: runs of integrations separated
    /// by gaps longer than `gap_s`. Returns (start, end) times, inclusive.
    pub fn add_scans(&self, gap_s: f64) -> Vec<(f64, f64)> {
        let mut times: Vec<f64> = self.vis.iter().map(|v| v.time).collect();
        times.sort_unstable_by(|a, b| a.total_cmp(b));
        times.dedup_by(|a, b| (*a - *b).abs() < TIME_TOL);

        let mut scans = vec![];
        let mut start = match times.first() {
            Some(&t) => t,
            None => return scans,
        };
        let mut prev = start;
        for &t in &times[1..] {
            if t - prev > gap_s {
                scans.push((start, prev));
                start = t;
            }
            prev = t;
        }
        scans.push((start, prev));
        debug!("{} integrations partitioned into {} scans", times.len(), scans.len());
        scans
    }

    /// Coherently average each baseline over each scan: the complex mean of
    /// every Stokes component, sigma reduced by sqrt(N), u and v averaged and
    /// the scan midpoint as the timestamp.
    pub fn avg_coherent(&self, scans: &[(f64, f64)]) -> Obsdata {
        let mut averaged = vec![];
        for &(start, end) in scans {
            let mid = (start + end) / 2.0;
            let mut in_scan: Vec<&Visibility> = self
                .vis
                .iter()
                .filter(|v| v.time >= start - TIME_TOL && v.time <= end + TIME_TOL)
                .collect();
            // Group by baseline within the scan.
            in_scan.sort_unstable_by(|a, b| {
                a.ant1
                    .cmp(&b.ant1)
                    .then(a.ant2.cmp(&b.ant2))
                    .then(a.time.total_cmp(&b.time))
            });
            for ((ant1, ant2), group) in &in_scan.iter().group_by(|v| (v.ant1, v.ant2)) {
                let group: Vec<&&Visibility> = group.collect();
                let n = group.len() as f64;
                let mean = |f: fn(&Visibility) -> Complex64| {
                    group.iter().map(|v| f(v)).sum::<Complex64>() / n
                };
                averaged.push(Visibility {
                    time: mid,
                    ant1,
                    ant2,
                    i: mean(|v| v.i),
                    q: mean(|v| v.q),
                    u: mean(|v| v.u),
                    sigma: group.iter().map(|v| v.sigma.powi(2)).sum::<f64>().sqrt() / n,
                    uu: group.iter().map(|v| v.uu).sum::<f64>() / n,
                    vv: group.iter().map(|v| v.vv).sum::<f64>() / n,
                });
            }
        }
        averaged.sort_unstable_by(|a, b| {
            a.time
                .total_cmp(&b.time)
                .then(a.ant1.cmp(&b.ant1))
                .then(a.ant2.cmp(&b.ant2))
        });
        debug!(
            "Scan averaging: {} -> {} visibilities",
            self.vis.len(),
            averaged.len()
        );
        Obsdata {
            vis: averaged,
            ..self.clone()
        }
    }

    /// Drop every visibility involving any of the named stations (e.g. the
    /// SMA reference antenna "SR", which duplicates "SM").
    pub fn flag_sites(&self, codes: &[&str]) -> Obsdata {
        let flagged: Vec<usize> = codes.iter().filter_map(|c| self.station_index(c)).collect();
        let vis = self
            .vis
            .iter()
            .filter(|v| !flagged.contains(&v.ant1) && !flagged.contains(&v.ant2))
            .copied()
            .collect::<Vec<_>>();
        debug!(
            "Flagging {codes:?}: {} -> {} visibilities",
            self.vis.len(),
            vis.len()
        );
        Obsdata {
            vis,
            ..self.clone()
        }
    }

    /// Closure phases on every station triangle with all three baselines
    /// present at a timestamp. The phase is the argument of the bispectrum
    /// V12 V23 V31*, in degrees; the uncertainty is the usual linearized
    /// propagation of the per-baseline SNRs.
    pub fn closure_phases(&self) -> Vec<ClosurePhase> {
        let mut cphases = vec![];
        let mut i_vis = 0;
        while i_vis < self.vis.len() {
            let time = self.vis[i_vis].time;
            let mut snapshot = vec![];
            while i_vis < self.vis.len() && (self.vis[i_vis].time - time).abs() < TIME_TOL {
                snapshot.push(self.vis[i_vis]);
                i_vis += 1;
            }

            let find = |a: usize, b: usize| {
                snapshot
                    .iter()
                    .find(|v| (v.ant1, v.ant2) == (a.min(b), a.max(b)))
            };
            let mut ants: Vec<usize> = snapshot
                .iter()
                .flat_map(|v| [v.ant1, v.ant2])
                .collect();
            ants.sort_unstable();
            ants.dedup();

            for tri in ants.iter().copied().combinations(3) {
                let (a1, a2, a3) = (tri[0], tri[1], tri[2]);
                let (v12, v23, v13) = match (find(a1, a2), find(a2, a3), find(a1, a3)) {
                    (Some(x), Some(y), Some(z)) => (x, y, z),
                    _ => continue,
                };
                let bispectrum = v12.i * v23.i * v13.i.conj();
                let snr2 = |v: &Visibility| (v.sigma / v.i.norm()).powi(2);
                cphases.push(ClosurePhase {
                    time,
                    triangle: [a1, a2, a3],
                    cphase: bispectrum.arg().to_degrees(),
                    sigma_cp: (snr2(v12) + snr2(v23) + snr2(v13)).sqrt().to_degrees(),
                    u: [v12.uu, v23.uu, -v13.uu],
                    v: [v12.vv, v23.vv, -v13.vv],
                });
            }
        }
        cphases
    }

    /// Visibility amplitudes \[Jy\].
    pub fn amps(&self) -> Vec<f64> {
        self.vis.iter().map(|v| v.i.norm()).collect()
    }

    /// Linearly-polarized amplitudes \[Jy\].
    pub fn pamps(&self) -> Vec<f64> {
        self.vis.iter().map(Visibility::pamp).collect()
    }

    /// Per-sample thermal noise \[Jy\].
    pub fn sigmas(&self) -> Vec<f64> {
        self.vis.iter().map(|v| v.sigma).collect()
    }

    /// Radial uv distances \[wavelengths\].
    pub fn uvdists(&self) -> Vec<f64> {
        self.vis.iter().map(Visibility::uvdist).collect()
    }
}
