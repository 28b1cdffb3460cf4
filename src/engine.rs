//! External circuit engine.
//!
//! The pipeline hands a complete netlist to an engine and gets the raw text
//! output back. `NgspiceEngine` runs ngspice in batch mode inside a private
//! temporary directory per attempt, kills it on timeout, and retries
//! timeouts and failed runs a bounded number of times with jittered backoff.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{PvError, Result};

const INPUT_FILE: &str = "circuit.cir";
const OUTPUT_FILE: &str = "circuit.out";

/// Blocking text-in/text-out circuit solver.
pub trait CircuitEngine: Send + Sync {
    fn solve(&self, netlist: &str) -> Result<String>;
}

impl<F> CircuitEngine for F
where
    F: Fn(&str) -> Result<String> + Send + Sync,
{
    fn solve(&self, netlist: &str) -> Result<String> {
        self(netlist)
    }
}

/// ngspice in batch mode (`ngspice -b in.cir -o out.txt`).
#[derive(Debug, Clone, Default)]
pub struct NgspiceEngine {
    config: EngineConfig,
}

impl NgspiceEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the configured executable can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.executable)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn run_once(&self, netlist: &str) -> Result<String> {
        let dir = tempfile::Builder::new().prefix("pvcircuit").tempdir()?;
        let input = dir.path().join(INPUT_FILE);
        let output = dir.path().join(OUTPUT_FILE);
        std::fs::write(&input, netlist)?;

        let child = Command::new(&self.config.executable)
            .arg("-b")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PvError::SolverUnavailable(format!("{}: {}", self.config.executable, e))
            })?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let (status, stderr) = wait_with_timeout(child, timeout)?;
        if !status.success() {
            return Err(PvError::SolverFailed {
                status: status.to_string(),
                stderr,
            });
        }
        read_output(&output, &stderr)
    }
}

impl CircuitEngine for NgspiceEngine {
    fn solve(&self, netlist: &str) -> Result<String> {
        with_retry(self.config.max_attempts, self.config.retry_base_ms, |attempt| {
            debug!(attempt, executable = %self.config.executable, "running circuit engine");
            self.run_once(netlist)
        })
    }
}

fn read_output(path: &Path, stderr: &str) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) => Err(PvError::SolverFailed {
            status: format!("no output file ({})", e),
            stderr: stderr.to_string(),
        }),
    }
}

/// Wait for a child, killing it once `timeout` has passed.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<(ExitStatus, String)> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(50);

    loop {
        match child.try_wait()? {
            Some(status) => {
                let mut stderr = String::new();
                if let Some(mut pipe) = child.stderr.take() {
                    pipe.read_to_string(&mut stderr).ok();
                }
                return Ok((status, stderr));
            }
            None => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PvError::SolverTimedOut(timeout));
                }
                thread::sleep(poll_interval);
            }
        }
    }
}

/// Run `attempt` up to `max_attempts` times, sleeping
/// `base_ms * 2^(n-1)` plus up to `base_ms` of jitter between tries.
/// Only retryable errors trigger another attempt.
pub fn with_retry<T>(max_attempts: u32, base_ms: u64, mut attempt: impl FnMut(u32) -> Result<T>) -> Result<T> {
    let max_attempts = max_attempts.max(1);
    let mut n = 1;
    loop {
        match attempt(n) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && n < max_attempts => {
                let backoff = base_ms.saturating_mul(1 << (n - 1).min(16));
                let jitter = if base_ms > 0 {
                    rand::thread_rng().gen_range(0..=base_ms)
                } else {
                    0
                };
                let delay = Duration::from_millis(backoff + jitter);
                warn!(attempt = n, error = %e, ?delay, "circuit engine attempt failed, retrying");
                thread::sleep(delay);
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
