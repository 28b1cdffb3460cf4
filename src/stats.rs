//! Performance statistics collection for `--stats` output.

use std::time::{Duration, Instant};

/// Collects phase timings and pipeline counters.
///
/// Created when `--stats` is passed, threaded as `Option<&mut Stats>`.
/// Nothing is timed or counted when `None`.
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    /// Completed solver passes, refinements included.
    pub passes: u32,
    /// Tiles encoded over all passes.
    pub tiles: usize,
    /// Zero-ohm resistors removed by the reducer over all passes.
    pub shorts: usize,
    /// Tiles zero-filled because the solver did not report them.
    pub missing_tiles: usize,
    /// Mesh refinements that changed the mesh.
    pub refinements: u32,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            passes: 0,
            tiles: 0,
            shorts: 0,
            missing_tiles: 0,
            refinements: 0,
        }
    }

    /// Record a completed phase with its duration.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    /// Phase names in the order they were recorded.
    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|(name, _)| *name).collect()
    }

    /// Summed duration of every phase called `name`.
    pub fn phase_total(&self, name: &str) -> Duration {
        self.phases
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, d)| *d)
            .sum()
    }

    /// Fold another collector (e.g. from a scan worker) into this one.
    pub fn merge(&mut self, other: Stats) {
        self.phases.extend(other.phases);
        self.passes += other.passes;
        self.tiles += other.tiles;
        self.shorts += other.shorts;
        self.missing_tiles += other.missing_tiles;
        self.refinements += other.refinements;
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== pvcircuit Stats ===");

        let mut seen: Vec<&'static str> = Vec::new();
        for (name, _) in &self.phases {
            if !seen.contains(name) {
                seen.push(name);
            }
        }
        for name in seen {
            eprintln!("  {:<24} {:>8.3}s", name, self.phase_total(name).as_secs_f64());
        }

        eprintln!("  Passes:                 {}", self.passes);
        if self.refinements > 0 {
            eprintln!("  Refinements:            {}", self.refinements);
        }
        eprintln!("  Tiles encoded:          {}", self.tiles);
        eprintln!("  Shorts collapsed:       {}", self.shorts);
        if self.missing_tiles > 0 {
            eprintln!("  Missing tiles:          {}", self.missing_tiles);
        }

        eprintln!("  ─────────────────────────────────");
        eprintln!("  Total:                  {:>8.3}s", total.as_secs_f64());
    }
}
