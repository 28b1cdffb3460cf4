use clap::Parser;
use pvcircuit::config::RunConfig;
use pvcircuit::engine::NgspiceEngine;
use pvcircuit::orchestrator::{self, Adaptive};
use pvcircuit::output;
use pvcircuit::scan;
use std::io;
use std::path::PathBuf;

/// Quasi-3D photovoltaic network solver driving an external SPICE engine
#[derive(Parser)]
#[command(name = "pvcircuit", version)]
struct Cli {
    /// TOML run configuration
    config: PathBuf,

    /// Refine the mesh and re-solve up to N times
    #[arg(long, value_name = "N")]
    adaptive: Option<usize>,

    /// Voltage difference between neighbouring tiles that triggers refinement
    #[arg(long, default_value_t = 0.01)]
    threshold: f64,

    /// Print performance stats to stderr
    #[arg(long)]
    stats: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut stats = if cli.stats { Some(pvcircuit::stats::Stats::new()) } else { None };

    let config = RunConfig::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Error loading {}: {}", cli.config.display(), e);
        std::process::exit(1);
    });

    let engine = NgspiceEngine::new(config.engine.clone());
    let adaptive = cli.adaptive.map(|rounds| Adaptive {
        rounds,
        threshold: cli.threshold,
    });
    let mut stdout = io::stdout();

    if config.scan.is_empty() {
        let outcome = orchestrator::run(&config, &engine, adaptive, stats.as_mut()).unwrap_or_else(|e| {
            eprintln!("Solve error: {}", e);
            std::process::exit(1);
        });
        output::write_run_csv(&outcome, &mut stdout).unwrap_or_else(|e| {
            eprintln!("Output error: {}", e);
            std::process::exit(1);
        });
    } else {
        let rows = scan::scan_config(&config, &engine, adaptive, stats.as_mut());
        output::write_scan_csv(&rows, &mut stdout).unwrap_or_else(|e| {
            eprintln!("Output error: {}", e);
            std::process::exit(1);
        });
        if rows.iter().all(|r| r.outcome.is_err()) {
            eprintln!("Scan error: every point failed");
            std::process::exit(1);
        }
    }

    if let Some(ref stats) = stats {
        stats.display();
    }
}
