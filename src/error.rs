use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PvError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Mesh error: {0}")]
    Mesh(String),

    #[error("Naming error: {0}")]
    Naming(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Device parameter error: {0}")]
    Device(String),

    /// The solver executable could not be found or spawned.
    #[error("circuit solver unavailable: {0}")]
    SolverUnavailable(String),

    /// The solver ran but exited unsuccessfully.
    #[error("circuit solver failed ({status}): {stderr}")]
    SolverFailed { status: String, stderr: String },

    #[error("circuit solver timed out after {0:?}")]
    SolverTimedOut(Duration),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PvError {
    /// Whether a fresh solver attempt may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PvError::SolverTimedOut(_) | PvError::SolverFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, PvError>;
