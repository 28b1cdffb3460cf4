//! End-to-end integration tests for the pvcircuit pipeline.
//!
//! The external engine is replaced by in-process engines that read the
//! netlist back through the crate's own parser and answer with an ideal
//! single-diode model: every photocurrent source and every diode sees the
//! full bias, lateral resistances are ignored.

use std::collections::HashMap;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use pvcircuit::config::RunConfig;
use pvcircuit::error::{PvError, Result};
use pvcircuit::ir::{Directive, Value};
use pvcircuit::mask::default_mask;
use pvcircuit::orchestrator::{self, Adaptive};
use pvcircuit::output;
use pvcircuit::parser;
use pvcircuit::scan;
use pvcircuit::stats::Stats;

const VT: f64 = 0.025;
const PIXEL_AREA: f64 = 1e-12;
const JSC: f64 = 340.0;
const J01: f64 = 1e-20;

fn base_toml() -> String {
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
rw = 5
cw = 5

[sweep]
start = 0.0
end = 1.5
step = 0.01

[input]
shape = [20, 20]
fingers = 2
"
    .to_string()
}

fn config(extra: &str) -> RunConfig {
    RunConfig::from_toml(&format!("{}\n{}", base_toml(), extra)).expect("config failed")
}

/// Sweep points of the `.DC` card, end inclusive.
fn sweep_points(netlist: &str) -> Vec<f64> {
    let card = netlist
        .lines()
        .find(|l| l.starts_with(".DC"))
        .expect("no .DC card");
    let nums: Vec<f64> = card
        .split_whitespace()
        .skip(2)
        .map(|t| t.parse().expect("bad .DC number"))
        .collect();
    let (start, end, step) = (nums[0], nums[1], nums[2]);
    let mut points = Vec::new();
    let mut k = 0;
    while start + k as f64 * step < end - 1e-12 {
        points.push(start + k as f64 * step);
        k += 1;
    }
    points.push(end);
    points
}

/// Ideal-diode engine; `probe` gives the voltage reported for a node at a
/// bias.
fn ideal_engine(netlist: &str, probe: fn(&str, f64) -> f64) -> Result<String> {
    let directives = parser::parse_netlist(netlist)?;
    let models: HashMap<&str, (f64, f64)> = directives
        .iter()
        .filter_map(|d| match d {
            Directive::DiodeModel { name, is, n, .. } => Some((name.as_str(), (*is, *n))),
            _ => None,
        })
        .collect();
    let photo: f64 = directives
        .iter()
        .filter_map(|d| match d {
            Directive::CurrentSource {
                value: Value::Number(v),
                ..
            } => Some(*v),
            _ => None,
        })
        .sum();
    let diodes = directives
        .iter()
        .filter_map(|d| match d {
            Directive::Diode { model, .. } => Some(
                models
                    .get(model.as_str())
                    .copied()
                    .ok_or_else(|| PvError::Parse(format!("unknown model {}", model))),
            ),
            _ => None,
        })
        .collect::<Result<Vec<_>>>()?;

    let sweep = sweep_points(netlist);
    let mut out = format!("Circuit: test\nNo. of Data Rows : {}\n", sweep.len());
    out.push_str("Index   v-sweep         vdep#branch\n");
    for (k, v) in sweep.iter().enumerate() {
        let dark: f64 = diodes.iter().map(|(is, n)| is * ((v / (n * VT)).exp() - 1.0)).sum();
        out.push_str(&format!("{}\t{:e}\t{:e}\n", k, v, -(photo - dark)));
    }
    for d in &directives {
        if let Directive::Probe { nodes } = d {
            let header: Vec<String> = nodes.iter().map(|n| format!("v({})", n)).collect();
            out.push_str(&format!("\nIndex   v-sweep   {}\n", header.join("  ")));
            for (k, v) in sweep.iter().enumerate() {
                let values: Vec<String> = nodes.iter().map(|n| format!("{:e}", probe(n, *v))).collect();
                out.push_str(&format!("{}\t{:e}\t{}\n", k, v, values.join("\t")));
            }
        }
    }
    Ok(out)
}

fn flat_probe(node: &str, bias: f64) -> f64 {
    if node.starts_with("t_") {
        bias
    } else {
        0.0
    }
}

/// Top voltage rises by 0.1 per tile column.
fn column_gradient_probe(node: &str, _bias: f64) -> f64 {
    let col: usize = node
        .rsplit('_')
        .next()
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    0.1 * col as f64
}

fn flat_engine(netlist: &str) -> Result<String> {
    ideal_engine(netlist, flat_probe)
}

fn gradient_engine(netlist: &str) -> Result<String> {
    ideal_engine(netlist, column_gradient_probe)
}

// ── Single pixel ────────────────────────────────────────────────────

#[test]
fn test_single_pixel_iv_curve() {
    // appended lines land in the [input] table
    let cfg = config("single_pixel = true\nillumination = 1.0\n");
    let outcome = orchestrator::run(&cfg, &flat_engine, None, None).expect("run failed");
    let r = &outcome.result;

    assert_eq!(r.v.len(), cfg.sweep.steps());
    assert_eq!(r.i.len(), cfg.sweep.steps());
    assert!(outcome.voltage_map.is_none());
    assert_abs_diff_eq!(r.v[0], 0.0);
    assert_abs_diff_eq!(*r.v.last().unwrap(), 1.5, epsilon = 1e-9);

    assert_relative_eq!(r.i[0], JSC * PIXEL_AREA, max_relative = 1e-9);
    assert!(r.i.windows(2).all(|w| w[1] <= w[0]));

    let voc = r.open_circuit_voltage().expect("no open-circuit crossing");
    let expected = VT * (JSC / J01 + 1.0).ln();
    assert_abs_diff_eq!(voc, expected, epsilon = 0.01);
}

#[test]
fn test_single_pixel_current_scales_with_illumination() {
    let mut cfg = config("");
    cfg.input.single_pixel = true;
    cfg.input.illumination = 1.0;
    let one = orchestrator::run(&cfg, &flat_engine, None, None).expect("run failed");
    cfg.input.illumination = 10.0;
    let ten = orchestrator::run(&cfg, &flat_engine, None, None).expect("run failed");
    assert_relative_eq!(ten.result.i[0], 10.0 * one.result.i[0], max_relative = 1e-9);
    assert!(ten.result.open_circuit_voltage().unwrap() > one.result.open_circuit_voltage().unwrap());
}

#[test]
fn test_single_pixel_rejects_adaptive() {
    let mut cfg = config("");
    cfg.input.single_pixel = true;
    let adaptive = Some(Adaptive {
        rounds: 1,
        threshold: 0.01,
    });
    let err = orchestrator::run(&cfg, &flat_engine, adaptive, None).unwrap_err();
    assert!(matches!(err, PvError::Config(_)));
}

// ── Grid ────────────────────────────────────────────────────────────

#[test]
fn test_grid_short_circuit_current_counts_open_pixels() {
    let mut cfg = config("");
    cfg.solver.shade_metal = true;
    let outcome = orchestrator::run(&cfg, &flat_engine, None, None).expect("run failed");

    let mask = default_mask((20, 20), 2).unwrap();
    let open = mask.iter().filter(|&&v| v <= 0.0).count() as f64;
    assert!(open > 0.0);
    assert_relative_eq!(outcome.result.i[0], JSC * PIXEL_AREA * open, max_relative = 1e-9);

    let map = outcome.voltage_map.expect("no voltage map");
    assert_eq!(map.dim(), (4, 4));
    for v in map.iter() {
        assert_abs_diff_eq!(*v, 1.5, epsilon = 1e-9);
    }
    assert!(outcome.result.missing_tiles.is_empty());
}

#[test]
fn test_reduction_preserves_iv_curve() {
    let mut cfg = config("");
    cfg.solver.shade_metal = true;
    let reduced = orchestrator::run(&cfg, &flat_engine, None, None).expect("run failed");
    cfg.solver.reduce_shorts = false;
    let full = orchestrator::run(&cfg, &flat_engine, None, None).expect("run failed");

    assert_eq!(reduced.result.v, full.result.v);
    for (a, b) in reduced.result.i.iter().zip(&full.result.i) {
        assert_relative_eq!(*a, *b, max_relative = 1e-9);
    }
}

#[test]
fn test_adaptive_refines_columns() {
    let cfg = config("");
    let mut stats = Stats::new();
    let adaptive = Some(Adaptive {
        rounds: 2,
        threshold: 0.05,
    });
    let outcome = orchestrator::run(&cfg, &gradient_engine, adaptive, Some(&mut stats)).expect("run failed");

    assert_eq!(outcome.refinements, 2);
    assert_eq!(outcome.mesh.cols(), &[0, 1, 2, 3, 5, 6, 7, 8, 10, 11, 12, 13, 15]);
    assert_eq!(outcome.mesh.rows(), &[0, 5, 10, 15]);
    assert_eq!(outcome.mesh.history().len(), 2);

    let map = outcome.voltage_map.expect("no voltage map");
    assert_eq!(map.dim(), (4, 13));
    assert_abs_diff_eq!(map[[2, 12]], 1.2, epsilon = 1e-9);

    assert_eq!(stats.passes, 3);
    assert_eq!(stats.refinements, 2);
}

#[test]
fn test_adaptive_stops_when_flat() {
    let cfg = config("");
    let adaptive = Some(Adaptive {
        rounds: 5,
        threshold: 0.05,
    });
    let outcome = orchestrator::run(&cfg, &flat_engine, adaptive, None).expect("run failed");
    assert_eq!(outcome.refinements, 0);
    assert_eq!(outcome.mesh.cols(), &[0, 5, 10, 15]);
}

#[test]
fn test_ray_file_illumination() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rays.ray");
    let mut bytes = b"LTRF".to_vec();
    for v in [1i32, 0, 0, 0, 2, 3] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    for v in [0.0f32, 0.0, 0.0, 1.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    // two rays on the bus bars, one in the open middle of the cell
    for (x, z, power) in [(0.0f32, 0.0f32, 1.0f32), (10.0, 10.0, 1.0), (5.0, 5.0, 2.0)] {
        for v in [x, 0.0, z, 0.0, 1.0, 0.0, power, 500.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
    }
    bytes.extend_from_slice(b"LTRFEND");
    std::fs::write(&path, bytes).unwrap();

    let mut cfg = config("");
    cfg.solver.shade_metal = true;
    cfg.input.ray_file = Some(path);
    let outcome = orchestrator::run(&cfg, &flat_engine, None, None).expect("run failed");
    assert_relative_eq!(outcome.result.i[0], JSC * PIXEL_AREA * 2.0, max_relative = 1e-6);
}

#[test]
fn test_config_file_round_trip_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.toml");
    std::fs::write(&path, base_toml()).unwrap();
    let cfg = RunConfig::load(&path).expect("load failed");

    let outcome = orchestrator::run(&cfg, &flat_engine, None, None).expect("run failed");
    let mut buf = Vec::new();
    output::write_run_csv(&outcome, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let mut sections = text.split("\n\n");
    let iv = sections.next().unwrap();
    let map = sections.next().unwrap();
    assert_eq!(iv.lines().next(), Some("V,I"));
    assert_eq!(iv.lines().count(), cfg.sweep.steps() + 1);
    assert_eq!(map.lines().count(), 4);
}

// ── Scan ────────────────────────────────────────────────────────────

#[test]
fn test_scan_over_illumination() {
    let mut cfg = config("[scan]\nillumination = [1.0, 2.0, 4.0]\n");
    cfg.input.single_pixel = true;
    let mut stats = Stats::new();
    let rows = scan::scan_config(&cfg, &flat_engine, None, Some(&mut stats));

    assert_eq!(rows.len(), 3);
    let isc: Vec<f64> = rows
        .iter()
        .map(|r| r.outcome.as_ref().expect("point failed").result.i[0])
        .collect();
    assert_relative_eq!(isc[1], 2.0 * isc[0], max_relative = 1e-9);
    assert_relative_eq!(isc[2], 4.0 * isc[0], max_relative = 1e-9);
    assert_eq!(rows[2].params["illumination"], 4.0);
    assert_eq!(stats.passes, 3);

    let mut buf = Vec::new();
    output::write_scan_csv(&rows, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert!(text.starts_with("illumination,pmax,voc,error\n"));
}

#[test]
fn test_scan_reports_failing_points() {
    let mut cfg = config("[scan]\nfingers = [2.0, 50.0]\n");
    cfg.solver.shade_metal = true;
    let rows = scan::scan_config(&cfg, &flat_engine, None, None);
    assert!(rows[0].outcome.is_ok());
    assert!(matches!(rows[1].outcome, Err(PvError::Config(_))));
}
