pub mod compare;
pub mod ngspice;

use serde::Deserialize;

use pvcircuit::config::RunConfig;
use pvcircuit::orchestrator::{self, Adaptive, RunOutcome};

use self::compare::{compare_curves, format_report, Tolerances};
use self::ngspice::engine_or_skip;

// ── Manifest types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub defaults: Defaults,
    #[serde(rename = "case")]
    pub cases: Vec<CaseEntry>,
}

#[derive(Debug, Deserialize)]
pub struct Defaults {
    pub current_rel_tol: f64,
    pub current_abs_tol: f64,
}

#[derive(Debug, Deserialize)]
pub struct CaseEntry {
    pub name: String,
    pub file: String,
    pub adaptive_rounds: Option<usize>,
    pub threshold: Option<f64>,
    pub current_rel_tol: Option<f64>,
    pub current_abs_tol: Option<f64>,
}

// ── Manifest loading ────────────────────────────────────────────

pub fn load_manifest() -> Manifest {
    let content = std::fs::read_to_string("tests/regression/manifest.toml")
        .expect("failed to read tests/regression/manifest.toml");
    toml::from_str(&content).expect("failed to parse manifest.toml")
}

// ── Macro for test generation ───────────────────────────────────

macro_rules! regression_tests {
    ($($name:ident),* $(,)?) => {
        $(
            #[test]
            fn $name() {
                $crate::regression::run_regression_test(stringify!($name));
            }
        )*
    };
}

pub(crate) use regression_tests;

// ── Test runner ─────────────────────────────────────────────────

/// Solve a case through ngspice twice, with and without short reduction, and
/// require the two terminal curves to agree.
pub fn run_regression_test(name: &str) {
    let manifest = load_manifest();
    let entry = manifest
        .cases
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("case '{}' not found in manifest", name));

    let path = format!("tests/regression/cases/{}", entry.file);
    let mut config = RunConfig::load(std::path::Path::new(&path))
        .unwrap_or_else(|e| panic!("failed to load {}: {}", path, e));

    let Some(engine) = engine_or_skip(name, &config.engine) else {
        return;
    };
    let adaptive = entry.adaptive_rounds.map(|rounds| Adaptive {
        rounds,
        threshold: entry.threshold.unwrap_or(0.01),
    });

    config.solver.reduce_shorts = true;
    let reduced = orchestrator::run(&config, &engine, adaptive, None)
        .unwrap_or_else(|e| panic!("reduced solve failed for '{}': {e}", name));
    check_properties(name, &config, &reduced);

    config.solver.reduce_shorts = false;
    let full = orchestrator::run(&config, &engine, adaptive, None)
        .unwrap_or_else(|e| panic!("unreduced solve failed for '{}': {e}", name));
    check_properties(name, &config, &full);

    let tol = Tolerances {
        rel_tol: entry.current_rel_tol.unwrap_or(manifest.defaults.current_rel_tol),
        abs_tol: entry.current_abs_tol.unwrap_or(manifest.defaults.current_abs_tol),
    };
    let results = compare_curves(&reduced.result.v, &reduced.result.i, &full.result.i, &tol);
    if results.iter().any(|r| !r.passed) {
        panic!(
            "\n\nRegression test '{}' FAILED:\n\n{}\n",
            name,
            format_report(&results)
        );
    }
}

fn check_properties(name: &str, config: &RunConfig, outcome: &RunOutcome) {
    let r = &outcome.result;
    assert_eq!(r.v.len(), config.sweep.steps(), "'{}': sweep length", name);
    assert!(r.i[0] > 0.0, "'{}': no short-circuit current", name);
    assert!(
        r.open_circuit_voltage().is_some(),
        "'{}': curve never crosses zero current",
        name
    );
    assert!(r.missing_tiles.is_empty(), "'{}': tiles missing from output", name);
}
