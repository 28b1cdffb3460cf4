//! Parameter-grid scans.
//!
//! A grid maps parameter names to candidate values. Its points are the
//! cartesian product of those lists, taken in sorted-key order so the same
//! grid always yields the same sequence. Points are independent and solved in
//! parallel; every point gets its own orchestrator and, through the engine,
//! its own scratch directory.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::engine::CircuitEngine;
use crate::error::{PvError, Result};
use crate::orchestrator::{run, Adaptive, RunOutcome};
use crate::stats::Stats;

/// Candidate values per parameter name.
pub type ParamGrid = BTreeMap<String, Vec<f64>>;

/// One assignment of a value to every parameter of a grid.
pub type ParamPoint = BTreeMap<String, f64>;

/// Every point of every grid, grid by grid. An empty grid contributes one
/// empty point.
pub fn param_points(grids: &[ParamGrid]) -> Vec<ParamPoint> {
    let mut out = Vec::with_capacity(count_points(grids));
    for grid in grids {
        let mut points = vec![ParamPoint::new()];
        for (name, values) in grid {
            points = points
                .into_iter()
                .flat_map(|p| {
                    values.iter().map(move |&v| {
                        let mut next = p.clone();
                        next.insert(name.clone(), v);
                        next
                    })
                })
                .collect();
        }
        out.extend(points);
    }
    out
}

/// Number of points `param_points` yields.
pub fn count_points(grids: &[ParamGrid]) -> usize {
    grids
        .iter()
        .map(|g| g.values().map(Vec::len).product::<usize>())
        .sum()
}

/// Result of one scan point.
#[derive(Debug)]
pub struct ScanRow<T> {
    pub params: ParamPoint,
    pub outcome: Result<T>,
}

/// Evaluate `f` at every point in parallel. Rows come back in point order;
/// a failing point does not stop the others.
pub fn run_scan<T, F>(grids: &[ParamGrid], f: F) -> Vec<ScanRow<T>>
where
    T: Send,
    F: Fn(&ParamPoint) -> Result<T> + Sync,
{
    let points = param_points(grids);
    info!(points = points.len(), "starting parameter scan");
    points
        .into_par_iter()
        .map(|params| {
            let outcome = f(&params);
            if let Err(e) = &outcome {
                warn!(?params, error = %e, "scan point failed");
            }
            ScanRow { params, outcome }
        })
        .collect()
}

/// Copy of `base` with the values of `point` applied.
///
/// Recognized names: `illumination`, `fingers`, `temperature`, `r_contact`,
/// `rho_metal`, `finger_h`, `pixel_lr`, `pixel_lc`, `rw`, `cw`, and
/// `jsc_scale` (multiplies every junction's `jsc`).
pub fn apply_point(base: &RunConfig, point: &ParamPoint) -> Result<RunConfig> {
    let mut cfg = base.clone();
    cfg.scan.clear();
    for (name, &v) in point {
        match name.as_str() {
            "illumination" => cfg.input.illumination = v,
            "fingers" => cfg.input.fingers = as_count(name, v)?,
            "temperature" => cfg.solver.temperature = v,
            "r_contact" => cfg.device.r_contact = v,
            "rho_metal" => cfg.device.rho_metal = v,
            "finger_h" => cfg.geometry.finger_h = v,
            "pixel_lr" => cfg.geometry.pixel_lr = v,
            "pixel_lc" => cfg.geometry.pixel_lc = v,
            "rw" => cfg.mesh.rw = as_count(name, v)?,
            "cw" => cfg.mesh.cw = as_count(name, v)?,
            "jsc_scale" => cfg.device.jsc.iter_mut().for_each(|j| *j *= v),
            _ => return Err(PvError::Config(format!("unknown scan parameter '{}'", name))),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn as_count(name: &str, v: f64) -> Result<usize> {
    if v < 0.0 || v.fract() != 0.0 || !v.is_finite() {
        return Err(PvError::Config(format!("scan parameter '{}' must be a whole number, got {}", name, v)));
    }
    Ok(v as usize)
}

/// Scan `base.scan`, solving every point with `engine`. Per-point stats are
/// merged into `stats` when given.
pub fn scan_config(
    base: &RunConfig,
    engine: &dyn CircuitEngine,
    adaptive: Option<Adaptive>,
    stats: Option<&mut Stats>,
) -> Vec<ScanRow<RunOutcome>> {
    let grids = [base.scan.clone()];
    let collect = stats.is_some();
    let rows = run_scan(&grids, |point| {
        let cfg = apply_point(base, point)?;
        let mut local = collect.then(Stats::new);
        let outcome = run(&cfg, engine, adaptive, local.as_mut())?;
        Ok((outcome, local))
    });

    let mut merged = stats;
    rows.into_iter()
        .map(|row| ScanRow {
            params: row.params,
            outcome: row.outcome.map(|(outcome, local)| {
                if let (Some(total), Some(local)) = (merged.as_deref_mut(), local) {
                    total.merge(local);
                }
                outcome
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(entries: &[(&str, &[f64])]) -> ParamGrid {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect()
    }

    #[test]
    fn test_points_are_sorted_product() {
        let g = grid(&[("b", &[3.0, 4.0]), ("a", &[1.0, 2.0])]);
        let points = param_points(&[g]);
        let pairs: Vec<(f64, f64)> = points.iter().map(|p| (p["a"], p["b"])).collect();
        assert_eq!(pairs, vec![(1.0, 3.0), (1.0, 4.0), (2.0, 3.0), (2.0, 4.0)]);
    }

    #[test]
    fn test_count_matches_points() {
        let grids = [
            grid(&[("a", &[1.0, 2.0]), ("b", &[2.0, 3.0]), ("c", &[1.0])]),
            ParamGrid::new(),
        ];
        assert_eq!(count_points(&grids), 5);
        assert_eq!(param_points(&grids).len(), 5);
        assert!(param_points(&grids)[4].is_empty());
    }

    #[test]
    fn test_run_scan_keeps_order_and_failures() {
        let g = grid(&[("a", &[1.0, 2.0, 3.0]), ("b", &[10.0])]);
        let rows = run_scan(&[g], |p| {
            if p["a"] == 2.0 {
                Err(PvError::Config("boom".into()))
            } else {
                Ok(p["a"] + p["b"])
            }
        });
        assert_eq!(rows.len(), 3);
        assert_eq!(*rows[0].outcome.as_ref().unwrap(), 11.0);
        assert!(rows[1].outcome.is_err());
        assert_eq!(*rows[2].outcome.as_ref().unwrap(), 13.0);
    }

    #[test]
    fn test_apply_point() {
        let base = RunConfig::from_toml(&minimal_toml()).unwrap();
        let mut point = ParamPoint::new();
        point.insert("illumination".into(), 50.0);
        point.insert("rw".into(), 5.0);
        point.insert("jsc_scale".into(), 2.0);
        let cfg = apply_point(&base, &point).unwrap();
        assert_eq!(cfg.input.illumination, 50.0);
        assert_eq!(cfg.mesh.rw, 5);
        assert_eq!(cfg.device.jsc[0], 2.0 * base.device.jsc[0]);

        point.insert("rw".into(), 2.5);
        assert!(apply_point(&base, &point).is_err());
        let mut unknown = ParamPoint::new();
        unknown.insert("colour".into(), 1.0);
        assert!(matches!(apply_point(&base, &unknown), Err(PvError::Config(_))));
    }

    fn minimal_toml() -> String {
        "\
[device]
jsc = [340.0]
j01 = [1e-20]
j02 = [1e-13]
n1 = [1.0]
n2 = [2.0]
eg = [1.42]
rs_top = [100.0]
rs_bot = [1e-9]
r_series = [1e-10]
r_shunt = [1e10]
r_contact = 1e-7
rho_metal = 4.9e-8

[geometry]
pixel_lr = 1e-6
pixel_lc = 1e-6
finger_h = 1e-6

[mesh]
rw = 10
cw = 10

[sweep]
start = 0.0
end = 1.0
step = 0.5
"
        .to_string()
    }
}
