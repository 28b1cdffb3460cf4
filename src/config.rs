//! Run configuration.
//!
//! Every parameter the pipeline reads is declared here. Required fields have
//! no default; optional ones carry `#[serde(default)]` with the value noted
//! on the field. A whole run is described by one TOML document:
//!
//! ```toml
//! [device]
//! jsc = [340.0]
//! j01 = [1e-20]
//! j02 = [1e-13]
//! n1 = [1.0]
//! n2 = [2.0]
//! eg = [1.42]
//! rs_top = [100.0]
//! rs_bot = [1e-9]
//! r_series = [1e-10]
//! r_shunt = [1e10]
//! r_contact = 1e-7
//! rho_metal = 4.9e-8
//!
//! [geometry]
//! pixel_lr = 1e-6
//! pixel_lc = 1e-6
//! finger_h = 1e-6
//!
//! [mesh]
//! rw = 10
//! cw = 10
//!
//! [sweep]
//! start = -1.0
//! end = 1.1
//! step = 0.01
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PvError, Result};

/// Per-junction device parameters, one array entry per junction (top first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Short-circuit current density at unit illumination (A/m^2).
    pub jsc: Vec<f64>,
    /// Saturation current density of the n1 diode (A/m^2).
    pub j01: Vec<f64>,
    /// Saturation current density of the n2 diode (A/m^2).
    pub j02: Vec<f64>,
    pub n1: Vec<f64>,
    pub n2: Vec<f64>,
    /// Band gap (eV).
    pub eg: Vec<f64>,
    /// Sheet resistance of the top lateral layer (ohm/sq).
    pub rs_top: Vec<f64>,
    /// Sheet resistance of the bottom lateral layer (ohm/sq).
    pub rs_bot: Vec<f64>,
    /// Specific series resistance between junctions (ohm m^2).
    pub r_series: Vec<f64>,
    /// Specific shunt resistance (ohm m^2).
    pub r_shunt: Vec<f64>,
    /// Specific contact resistance of the metal grid (ohm m^2).
    pub r_contact: f64,
    /// Metal resistivity (ohm m).
    pub rho_metal: f64,
}

impl DeviceConfig {
    pub fn junctions(&self) -> usize {
        self.jsc.len()
    }

    pub fn validate(&self) -> Result<()> {
        let n = self.junctions();
        if n == 0 {
            return Err(PvError::Config("device needs at least one junction".into()));
        }
        let arrays: [(&str, &Vec<f64>); 10] = [
            ("jsc", &self.jsc),
            ("j01", &self.j01),
            ("j02", &self.j02),
            ("n1", &self.n1),
            ("n2", &self.n2),
            ("eg", &self.eg),
            ("rs_top", &self.rs_top),
            ("rs_bot", &self.rs_bot),
            ("r_series", &self.r_series),
            ("r_shunt", &self.r_shunt),
        ];
        for (name, values) in arrays {
            if values.len() != n {
                return Err(PvError::Config(format!(
                    "device.{} has {} entries, expected {} (one per junction)",
                    name,
                    values.len(),
                    n
                )));
            }
        }
        Ok(())
    }

    /// Single GaAs-like junction used by tests and the CLI default.
    pub fn gaas() -> Self {
        Self {
            jsc: vec![340.0],
            j01: vec![1e-20],
            j02: vec![1e-13],
            n1: vec![1.0],
            n2: vec![2.0],
            eg: vec![1.42],
            rs_top: vec![100.0],
            rs_bot: vec![1e-9],
            r_series: vec![1e-10],
            r_shunt: vec![1e10],
            r_contact: 1e-7,
            rho_metal: 4.9e-8,
        }
    }
}

/// Physical pixel size and metal finger height, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub pixel_lr: f64,
    pub pixel_lc: f64,
    pub finger_h: f64,
}

impl GeometryConfig {
    pub fn pixel_area(&self) -> f64 {
        self.pixel_lr * self.pixel_lc
    }
}

/// Initial uniform tile size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub rw: usize,
    pub cw: usize,
}

/// Bias voltage sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl SweepConfig {
    /// Number of points the solver reports for this sweep, end inclusive.
    ///
    /// Counts `start + k*step < end` exactly (the way a half-open range would)
    /// and adds one for the end point, so ratios like `12 / 0.05` that land a
    /// hair under an integer do not lose a step.
    pub fn steps(&self) -> usize {
        if self.step <= 0.0 || self.step.is_nan() || self.end <= self.start {
            return 1;
        }
        let approx = ((self.end - self.start) / self.step).ceil() as usize;
        let mut k = approx.saturating_sub(1);
        while self.start + (k as f64) * self.step >= self.end && k > 0 {
            k -= 1;
        }
        while self.start + ((k + 1) as f64) * self.step < self.end {
            k += 1;
        }
        k + 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.step <= 0.0 || !self.step.is_finite() {
            return Err(PvError::Config(format!("sweep step must be positive, got {}", self.step)));
        }
        if self.end <= self.start {
            return Err(PvError::Config(format!(
                "sweep end {} must exceed start {}",
                self.end, self.start
            )));
        }
        Ok(())
    }
}

/// Switches for circuit terms the encoder can leave out. All off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderToggles {
    /// Emit the second (n2) diode at every junction.
    pub second_diode: bool,
    /// Emit the shunt resistor at every junction.
    pub shunt_resistor: bool,
    /// Use the configured series resistance instead of a short between
    /// stacked junctions.
    pub series_resistor: bool,
}

/// External circuit engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable name or path. Default `ngspice`.
    pub executable: String,
    /// Per-attempt wall-clock limit. Default 60.
    pub timeout_secs: u64,
    /// Attempts before giving up on retryable failures. Default 3.
    pub max_attempts: u32,
    /// Base delay between attempts; jitter is added on top. Default 200.
    pub retry_base_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executable: "ngspice".into(),
            timeout_secs: 60,
            max_attempts: 3,
            retry_base_ms: 200,
        }
    }
}

/// Solver pass options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Device temperature in degrees Celsius. Default 20.
    pub temperature: f64,
    /// Mask value above which a pixel is metal. Default 0.
    pub metal_threshold: f64,
    /// Peak mask value above which a metal tile is a bus bar. Default 250.
    pub bus_intensity: f64,
    /// Collapse zero-ohm resistors before solving. Default true.
    pub reduce_shorts: bool,
    /// Count illumination only on pixels at or below `metal_threshold`
    /// instead of above it. Default false.
    pub shade_metal: bool,
    /// Directory receiving the netlists and raw solver output of every pass.
    pub dump_dir: Option<PathBuf>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            temperature: 20.0,
            metal_threshold: 0.0,
            bus_intensity: 250.0,
            reduce_shorts: true,
            shade_metal: false,
            dump_dir: None,
        }
    }
}

/// Inputs for the command-line driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Raster size of the synthetic mask. Default 100 x 100.
    pub shape: (usize, usize),
    /// Fingers in the synthetic mask. Default 5.
    pub fingers: usize,
    /// Uniform illumination concentration. Default 1.
    pub illumination: f64,
    /// Ray-trace file to bin into the illumination map instead.
    pub ray_file: Option<PathBuf>,
    /// Solve a single 1x1 tile instead of the mesh.
    pub single_pixel: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            shape: (100, 100),
            fingers: 5,
            illumination: 1.0,
            ray_file: None,
            single_pixel: false,
        }
    }
}

/// Complete description of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub device: DeviceConfig,
    pub geometry: GeometryConfig,
    pub mesh: MeshConfig,
    pub sweep: SweepConfig,
    #[serde(default)]
    pub toggles: EncoderToggles,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub solver: SolverSettings,
    #[serde(default)]
    pub input: InputConfig,
    /// Parameter lists to scan, keyed by parameter name. Empty means a
    /// single run.
    #[serde(default)]
    pub scan: BTreeMap<String, Vec<f64>>,
}

impl RunConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.device.validate()?;
        self.sweep.validate()?;
        if self.mesh.rw == 0 || self.mesh.cw == 0 {
            return Err(PvError::Config("mesh.rw and mesh.cw must be positive".into()));
        }
        let g = &self.geometry;
        if !(g.pixel_lr > 0.0 && g.pixel_lc > 0.0 && g.finger_h > 0.0) {
            return Err(PvError::Config("geometry lengths must be positive".into()));
        }
        if self.engine.max_attempts == 0 {
            return Err(PvError::Config("engine.max_attempts must be at least 1".into()));
        }
        if let Some((name, _)) = self.scan.iter().find(|(_, values)| values.is_empty()) {
            return Err(PvError::Config(format!("scan.{} has no values", name)));
        }
        Ok(())
    }
}
