//! Solver orchestration.
//!
//! One `Orchestrator` owns a mesh, a metal mask and an illumination source
//! and drives a pass through
//!
//! ```text
//! Init -> HeaderBuilt -> NetworkBuilt -> Solved -> Parsed -> Rescaled -> Done
//! ```
//!
//! Every current in the netlist is multiplied by a normalization constant
//! `gn`, fixed at construction, so the solver sees photocurrents of order one.
//! The terminal current is divided back out after decoding. Adaptive solving
//! refines the mesh from the last voltage map and restarts the network build;
//! nothing from the previous pass is reused except the header.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use ndarray::{s, Array2, Array3, ArrayView2, Axis as NdAxis};
use tracing::{debug, info, info_span, warn};

use crate::config::{DeviceConfig, EncoderToggles, GeometryConfig, RunConfig, SolverSettings, SweepConfig};
use crate::decoder::{parse_output, DecodedOutput};
use crate::device::{DeviceParameterProvider, Illumination, ScaledProvider};
use crate::encoder::{Encoder, Neighbors};
use crate::engine::CircuitEngine;
use crate::error::{PvError, Result};
use crate::mask::default_mask;
use crate::mesh::{Axis, Mesh, Refinement, TileBox};
use crate::naming::{NodeNamer, BIAS_SOURCE, GROUND};
use crate::rayfile::RayFile;
use crate::reducer::NodeReducer;
use crate::stats::Stats;
use crate::tile::{resize_illumination, resize_illumination_3d, Classifier, Tile, TileKind};

/// Reference photocurrent density used to pick `gn` (A/m^2).
const SAMPLE_JSC: f64 = 340.0;
/// Target magnitude of the largest normalized tile photocurrent.
const TARGET_CURRENT: f64 = 100.0;

static INSTANCES: AtomicUsize = AtomicUsize::new(0);

/// Progress of the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Init,
    HeaderBuilt,
    NetworkBuilt,
    Solved,
    Parsed,
    Rescaled,
    Done,
}

/// Illumination aggregated per tile.
#[derive(Debug, Clone, PartialEq)]
pub enum TileIllumination {
    Planar(Array2<f64>),
    /// Last axis is wavelength.
    Spectral(Array3<f64>),
}

impl TileIllumination {
    pub fn at(&self, row: usize, col: usize) -> Result<Illumination<'_>> {
        match self {
            TileIllumination::Planar(a) => Ok(Illumination::Concentration(a[[row, col]])),
            TileIllumination::Spectral(a) => a
                .slice(s![row, col, ..])
                .to_slice()
                .map(Illumination::Spectrum)
                .ok_or_else(|| PvError::Mesh("spectral illumination is not contiguous".into())),
        }
    }
}

/// How raw illumination is reduced onto tiles.
pub trait IlluminationSource: Send + Sync {
    fn resize(&self, aperture: ArrayView2<f64>, coordset: &[Vec<TileBox>], threshold: f64) -> Result<TileIllumination>;

    /// Largest tile illumination, used to choose `gn`.
    fn peak(&self, aperture: ArrayView2<f64>, coordset: &[Vec<TileBox>], threshold: f64) -> Result<f64>;
}

/// One illumination value per raster pixel.
#[derive(Debug, Clone)]
pub struct PlanarIllumination(pub Array2<f64>);

impl IlluminationSource for PlanarIllumination {
    fn resize(&self, aperture: ArrayView2<f64>, coordset: &[Vec<TileBox>], threshold: f64) -> Result<TileIllumination> {
        resize_illumination(self.0.view(), aperture, coordset, threshold).map(TileIllumination::Planar)
    }

    fn peak(&self, aperture: ArrayView2<f64>, coordset: &[Vec<TileBox>], threshold: f64) -> Result<f64> {
        let tiles = resize_illumination(self.0.view(), aperture, coordset, threshold)?;
        Ok(max_of(tiles.iter()))
    }
}

/// A spectrum per raster pixel (rows x cols x wavelengths).
#[derive(Debug, Clone)]
pub struct SpectralIllumination(pub Array3<f64>);

impl IlluminationSource for SpectralIllumination {
    fn resize(&self, aperture: ArrayView2<f64>, coordset: &[Vec<TileBox>], threshold: f64) -> Result<TileIllumination> {
        resize_illumination_3d(self.0.view(), aperture, coordset, threshold).map(TileIllumination::Spectral)
    }

    /// Peak of the middle wavelength slice.
    fn peak(&self, aperture: ArrayView2<f64>, coordset: &[Vec<TileBox>], threshold: f64) -> Result<f64> {
        let nz = self.0.len_of(NdAxis(2));
        if nz == 0 {
            return Err(PvError::Mesh("spectral illumination has no wavelength slices".into()));
        }
        let middle = self.0.index_axis(NdAxis(2), nz / 2);
        let tiles = resize_illumination(middle, aperture, coordset, threshold)?;
        Ok(max_of(tiles.iter()))
    }
}

/// The same concentration on every pixel.
#[derive(Debug, Clone, Copy)]
pub struct UniformIllumination(pub f64);

impl IlluminationSource for UniformIllumination {
    fn resize(&self, aperture: ArrayView2<f64>, coordset: &[Vec<TileBox>], threshold: f64) -> Result<TileIllumination> {
        let field = Array2::from_elem(aperture.dim(), self.0);
        resize_illumination(field.view(), aperture, coordset, threshold).map(TileIllumination::Planar)
    }

    fn peak(&self, aperture: ArrayView2<f64>, coordset: &[Vec<TileBox>], threshold: f64) -> Result<f64> {
        let field = Array2::from_elem(aperture.dim(), self.0);
        let tiles = resize_illumination(field.view(), aperture, coordset, threshold)?;
        Ok(max_of(tiles.iter()))
    }
}

fn max_of<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.copied().fold(0.0, f64::max)
}

/// How tiles are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Mesh over a mask; produces a voltage map.
    Grid,
    /// One fully metallized bus tile; produces only the I-V curve.
    SinglePixel,
}

/// Collaborators and settings shared by every pass.
#[derive(Clone, Copy)]
pub struct SolverContext<'a> {
    pub provider: &'a dyn DeviceParameterProvider,
    pub engine: &'a dyn CircuitEngine,
    pub geometry: GeometryConfig,
    pub sweep: SweepConfig,
    pub toggles: EncoderToggles,
    pub settings: &'a SolverSettings,
}

/// Outcome of one completed pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    /// Bias voltage at each sweep step.
    pub v: Vec<f64>,
    /// Terminal current at each sweep step, normalization removed.
    pub i: Vec<f64>,
    /// Junction-0 top voltage per tile per step (grid layout only).
    pub v_junc: Option<Array3<f64>>,
    /// Tiles whose voltage was absent from the solver output and zero-filled.
    pub missing_tiles: Vec<(usize, usize)>,
}

impl SolveResult {
    /// Largest `v * i` over the sweep.
    pub fn max_power(&self) -> f64 {
        self.v
            .iter()
            .zip(&self.i)
            .map(|(v, i)| v * i)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Bias at which the current first changes sign from positive, by linear
    /// interpolation.
    pub fn open_circuit_voltage(&self) -> Option<f64> {
        self.v
            .windows(2)
            .zip(self.i.windows(2))
            .find(|(_, i)| i[0] > 0.0 && i[1] <= 0.0)
            .map(|(v, i)| v[0] + (v[1] - v[0]) * i[0] / (i[0] - i[1]))
    }
}

pub struct Orchestrator<'a> {
    ctx: SolverContext<'a>,
    layout: Layout,
    mask: Array2<f64>,
    illumination: Box<dyn IlluminationSource + 'a>,
    mesh: Mesh,
    gn: f64,
    steps: usize,
    state: PassState,
    header: String,
    body: String,
    input: String,
    raw_output: String,
    reducer: NodeReducer,
    namer: NodeNamer,
    result: Option<SolveResult>,
    instance: usize,
    passes: usize,
}

impl<'a> Orchestrator<'a> {
    /// Grid solver over `mask` with the given initial mesh.
    pub fn new(
        mask: Array2<f64>,
        illumination: Box<dyn IlluminationSource + 'a>,
        mesh: Mesh,
        ctx: SolverContext<'a>,
    ) -> Result<Self> {
        if mesh.extent() != mask.dim() {
            return Err(PvError::Mesh(format!(
                "mesh extent {:?} does not match mask shape {:?}",
                mesh.extent(),
                mask.dim()
            )));
        }
        Self::build(Layout::Grid, mask, illumination, mesh, ctx)
    }

    /// Single-tile solver under a uniform concentration.
    pub fn single_pixel(illumination: f64, ctx: SolverContext<'a>) -> Result<Self> {
        let mask = Array2::from_elem((1, 1), 255.0);
        Self::build(
            Layout::SinglePixel,
            mask,
            Box::new(UniformIllumination(illumination)),
            Mesh::single_pixel(),
            ctx,
        )
    }

    fn build(
        layout: Layout,
        mask: Array2<f64>,
        illumination: Box<dyn IlluminationSource + 'a>,
        mesh: Mesh,
        ctx: SolverContext<'a>,
    ) -> Result<Self> {
        ctx.sweep.validate()?;
        let mut this = Self {
            ctx,
            layout,
            mask,
            illumination,
            mesh,
            gn: 1.0,
            steps: ctx.sweep.steps(),
            state: PassState::Init,
            header: String::new(),
            body: String::new(),
            input: String::new(),
            raw_output: String::new(),
            reducer: NodeReducer::new(),
            namer: NodeNamer::default(),
            result: None,
            instance: INSTANCES.fetch_add(1, Ordering::Relaxed),
            passes: 0,
        };
        this.gn = this.find_gn()?;
        Ok(this)
    }

    fn find_gn(&self) -> Result<f64> {
        let aperture = self.aperture();
        let peak = self
            .illumination
            .peak(aperture.view(), &self.mesh.to_coordset(), self.ctx.settings.metal_threshold)?;
        let isc = peak * SAMPLE_JSC * self.ctx.geometry.pixel_area();
        if !(isc.is_finite() && isc > 0.0) {
            warn!(peak, "no illuminated tile, leaving currents unnormalized");
            return Ok(1.0);
        }
        Ok(TARGET_CURRENT / isc)
    }

    /// Mask handed to the illumination resize: the metal mask itself, or its
    /// complement when metal shades the cell.
    fn aperture(&self) -> Array2<f64> {
        let threshold = self.ctx.settings.metal_threshold;
        if self.ctx.settings.shade_metal {
            self.mask.mapv(|px| if px > threshold { threshold } else { threshold + 1.0 })
        } else {
            self.mask.clone()
        }
    }

    pub fn gn(&self) -> f64 {
        self.gn
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Sweep length every decoded trace must have.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Netlist sent to the engine in the last pass.
    pub fn netlist(&self) -> &str {
        &self.input
    }

    pub fn raw_output(&self) -> &str {
        &self.raw_output
    }

    pub fn reducer(&self) -> &NodeReducer {
        &self.reducer
    }

    pub fn result(&self) -> Option<&SolveResult> {
        self.result.as_ref()
    }

    /// Run one full pass.
    pub fn solve(&mut self, mut stats: Option<&mut Stats>) -> Result<&SolveResult> {
        let span = info_span!("solve", instance = self.instance, pass = self.passes);
        let _enter = span.enter();

        if self.state == PassState::Init {
            self.timed(&mut stats, "header", Self::build_header)?;
        } else {
            self.state = PassState::HeaderBuilt;
        }
        self.timed(&mut stats, "network", Self::build_network)?;
        self.timed(&mut stats, "reduce", Self::assemble)?;
        self.timed(&mut stats, "solve", Self::run_engine)?;
        let decoded = {
            let start = Instant::now();
            let decoded = self.decode()?;
            if let Some(s) = stats.as_deref_mut() {
                s.add_phase("decode", start.elapsed());
            }
            decoded
        };
        self.rescale(decoded);
        self.state = PassState::Done;
        self.passes += 1;

        if let Some(s) = stats {
            s.passes += 1;
            s.tiles += self.mesh.shape().0 * self.mesh.shape().1;
            s.shorts += self.reducer.stats().shorts;
            if let Some(r) = &self.result {
                s.missing_tiles += r.missing_tiles.len();
            }
        }
        self.result.as_ref().ok_or_else(|| PvError::Decode("pass produced no result".into()))
    }

    fn timed(
        &mut self,
        stats: &mut Option<&mut Stats>,
        phase: &'static str,
        step: fn(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let start = Instant::now();
        step(self)?;
        if let Some(s) = stats.as_deref_mut() {
            s.add_phase(phase, start.elapsed());
        }
        Ok(())
    }

    fn base_params(&self) -> Result<DeviceConfig> {
        self.ctx.provider.parameters(Illumination::Concentration(1.0))
    }

    fn encoder(&self) -> Encoder {
        Encoder::new(
            self.namer,
            self.ctx.toggles,
            self.gn,
            self.ctx.geometry.pixel_area(),
        )
    }

    fn build_header(&mut self) -> Result<()> {
        let params = self.base_params()?;
        self.header = self.encoder().create_header(&params, self.ctx.settings.temperature);
        self.state = PassState::HeaderBuilt;
        debug!(state = ?self.state, "header built");
        Ok(())
    }

    fn build_network(&mut self) -> Result<()> {
        let (rows, cols) = self.mesh.shape();
        self.namer = NodeNamer::for_grid(rows, cols);
        self.namer.check_grid(rows, cols)?;

        let coordset = self.mesh.to_coordset();
        let classifier = Classifier {
            metal_threshold: self.ctx.settings.metal_threshold,
            bus_intensity: self.ctx.settings.bus_intensity,
        };
        let base = self.base_params()?;
        let r_metal = base.rho_metal / self.ctx.geometry.finger_h / self.gn;
        let geometry = self.ctx.geometry;

        let tiles: Vec<Vec<Tile>> = coordset
            .iter()
            .enumerate()
            .map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .map(|(c, &bbox)| {
                        Tile::aggregate(
                            self.mask.view(),
                            r,
                            c,
                            bbox,
                            geometry.pixel_lr,
                            geometry.pixel_lc,
                            r_metal,
                            &classifier,
                        )
                    })
                    .collect()
            })
            .collect();
        let kinds: Vec<Vec<TileKind>> = tiles
            .iter()
            .map(|row| row.iter().map(|t| t.kind).collect())
            .collect();

        let aperture = self.aperture();
        let light = self
            .illumination
            .resize(aperture.view(), &coordset, self.ctx.settings.metal_threshold)?;

        let encoder = self.encoder();
        let mut body = String::new();
        for row in &tiles {
            for tile in row {
                let params = self.ctx.provider.parameters(light.at(tile.row, tile.col)?)?;
                if params.junctions() != base.junctions() {
                    return Err(PvError::Device(format!(
                        "provider returned {} junctions for tile ({}, {}), expected {}",
                        params.junctions(),
                        tile.row,
                        tile.col,
                        base.junctions()
                    )));
                }
                let neighbors = Neighbors::of(&kinds, tile.row, tile.col);
                body.push_str(&encoder.encode_tile(tile, &params, neighbors));
            }
        }

        let bus_tiles = kinds.iter().flatten().filter(|k| **k == TileKind::Bus).count();
        if bus_tiles == 0 {
            warn!("no bus-bar tile; the network has no connection to the bias source");
        }

        self.body = body;
        self.state = PassState::NetworkBuilt;
        debug!(state = ?self.state, rows, cols, bus_tiles, "network built");
        Ok(())
    }

    /// Assemble the full netlist and collapse its shorts.
    fn assemble(&mut self) -> Result<()> {
        let exec = self.encoder().create_exec(&self.ctx.sweep);
        let full = format!("{}{}{}.end\n", self.header, self.body, exec);
        self.dump("netlist", &full)?;

        self.input = if self.ctx.settings.reduce_shorts {
            let reduced = self.reducer.process(&full);
            self.dump("reduced", &reduced)?;
            reduced
        } else {
            self.reducer = NodeReducer::new();
            full
        };
        Ok(())
    }

    fn run_engine(&mut self) -> Result<()> {
        info!(bytes = self.input.len(), "invoking circuit engine");
        self.raw_output = self.ctx.engine.solve(&self.input)?;
        self.dump("output", &self.raw_output)?;
        self.state = PassState::Solved;
        debug!(state = ?self.state, "engine finished");
        Ok(())
    }

    fn decode(&mut self) -> Result<SolveResult> {
        let decoded = parse_output(&self.raw_output);
        let branch = format!("{}#branch", BIAS_SOURCE);
        let iv = decoded
            .get(&branch)
            .ok_or_else(|| PvError::Decode(format!("no {} table in solver output", branch)))?;

        if iv.values.len() != self.steps {
            return Err(PvError::Decode(format!(
                "{} has {} sweep points, expected {}",
                branch,
                iv.values.len(),
                self.steps
            )));
        }

        let mut result = SolveResult {
            v: iv.sweep.clone(),
            i: iv.values.clone(),
            v_junc: None,
            missing_tiles: Vec::new(),
        };
        if self.layout == Layout::Grid {
            let (v_junc, missing) = self.voltage_map(&decoded)?;
            result.v_junc = Some(v_junc);
            result.missing_tiles = missing;
        }

        self.state = PassState::Parsed;
        debug!(state = ?self.state, traces = decoded.len(), "output parsed");
        Ok(result)
    }

    fn voltage_map(&self, decoded: &DecodedOutput) -> Result<(Array3<f64>, Vec<(usize, usize)>)> {
        let (rows, cols) = self.mesh.shape();
        let mut v_junc = Array3::zeros((rows, cols, self.steps));
        let mut missing = Vec::new();

        for r in 0..rows {
            for c in 0..cols {
                let key = self.namer.probe_key(r, c);
                let trace = match decoded.get(&key) {
                    Some(t) => Some(t),
                    None => match self.reducer.find_root(&key) {
                        Some(GROUND) => continue,
                        Some(root) => decoded.get(root),
                        None => None,
                    },
                };
                let Some(trace) = trace else {
                    warn!(key = %key, "tile voltage missing from solver output, filling with 0");
                    missing.push((r, c));
                    continue;
                };
                if trace.values.len() != self.steps {
                    return Err(PvError::Decode(format!(
                        "{} has {} sweep points, expected {}",
                        key,
                        trace.values.len(),
                        self.steps
                    )));
                }
                v_junc
                    .slice_mut(s![r, c, ..])
                    .assign(&ndarray::ArrayView1::from(&trace.values[..]));
            }
        }
        Ok((v_junc, missing))
    }

    fn rescale(&mut self, mut result: SolveResult) {
        let gn = self.gn;
        result.i.iter_mut().for_each(|i| *i = -*i / gn);
        self.result = Some(result);
        self.state = PassState::Rescaled;
        debug!(state = ?self.state, gn, "currents rescaled");
    }

    /// Junction voltage map at the last sweep step.
    pub fn end_voltage_map(&self) -> Result<Array2<f64>> {
        if self.layout == Layout::SinglePixel {
            return Err(PvError::Mesh("single-pixel solver has no voltage map".into()));
        }
        let v_junc = self
            .result
            .as_ref()
            .and_then(|r| r.v_junc.as_ref())
            .ok_or_else(|| PvError::Decode("no solved voltage map yet".into()))?;
        let last = v_junc.len_of(NdAxis(2)).saturating_sub(1);
        Ok(v_junc.index_axis(NdAxis(2), last).to_owned())
    }

    /// Refine the column boundaries from the middle row of the last voltage
    /// map and solve again.
    ///
    /// Returns `Refinement::Unchanged` without re-solving when no pair of
    /// neighbouring tiles differs by at least `threshold`.
    pub fn resolve(&mut self, threshold: f64, stats: Option<&mut Stats>) -> Result<Refinement> {
        let map = self.end_voltage_map()?;
        let rows = map.nrows();
        let middle = rows.div_ceil(2).min(rows.saturating_sub(1));
        let sample: Vec<f64> = map.row(middle).to_vec();

        let outcome = self.mesh.refine(&sample, threshold, Axis::Col)?;
        if outcome.is_refined() {
            self.state = PassState::HeaderBuilt;
            self.solve(stats)?;
        }
        Ok(outcome)
    }

    /// Solve, then refine and re-solve until the mesh stops changing or
    /// `max_rounds` refinements have run. Returns the refinements performed.
    pub fn solve_adaptive(&mut self, threshold: f64, max_rounds: usize, mut stats: Option<&mut Stats>) -> Result<usize> {
        self.solve(stats.as_deref_mut())?;
        let mut rounds = 0;
        while rounds < max_rounds {
            match self.resolve(threshold, stats.as_deref_mut())? {
                Refinement::Refined(added) => {
                    rounds += 1;
                    if let Some(s) = stats.as_deref_mut() {
                        s.refinements += 1;
                    }
                    info!(round = rounds, added = added.len(), "mesh refined and re-solved");
                }
                Refinement::Unchanged => break,
            }
        }
        Ok(rounds)
    }

    fn dump(&self, kind: &str, text: &str) -> Result<()> {
        let Some(dir) = self.ctx.settings.dump_dir.as_deref() else {
            return Ok(());
        };
        write_dump(dir, &self.dump_name(kind), text)
    }

    fn dump_name(&self, kind: &str) -> String {
        format!(
            "pvcircuit-{}-{}-pass{}-{}.txt",
            std::process::id(),
            self.instance,
            self.passes,
            kind
        )
    }
}

/// Mesh refinement schedule for `run`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adaptive {
    pub rounds: usize,
    pub threshold: f64,
}

/// Everything a finished run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub result: SolveResult,
    /// Junction voltage map at the last sweep step (grid layout only).
    pub voltage_map: Option<Array2<f64>>,
    pub gn: f64,
    pub mesh: Mesh,
    pub refinements: usize,
}

/// Build the inputs a `RunConfig` describes and solve them.
pub fn run(
    config: &RunConfig,
    engine: &dyn CircuitEngine,
    adaptive: Option<Adaptive>,
    mut stats: Option<&mut Stats>,
) -> Result<RunOutcome> {
    config.validate()?;
    let provider = ScaledProvider::new(config.device.clone())?;
    let ctx = SolverContext {
        provider: &provider,
        engine,
        geometry: config.geometry,
        sweep: config.sweep,
        toggles: config.toggles,
        settings: &config.solver,
    };

    let input = &config.input;
    let mut solver = if input.single_pixel {
        if adaptive.is_some() {
            return Err(PvError::Config("adaptive refinement needs a mesh, not a single pixel".into()));
        }
        Orchestrator::single_pixel(input.illumination, ctx)?
    } else {
        let mask = default_mask(input.shape, input.fingers)?;
        let illumination: Box<dyn IlluminationSource> = match &input.ray_file {
            Some(path) => {
                let rays = RayFile::read(path)?;
                Box::new(PlanarIllumination(rays.bin_power(input.shape.0, input.shape.1)?))
            }
            None => Box::new(UniformIllumination(input.illumination)),
        };
        let mesh = Mesh::uniform(input.shape, config.mesh.rw, config.mesh.cw)?;
        Orchestrator::new(mask, illumination, mesh, ctx)?
    };

    let refinements = match adaptive {
        Some(a) => solver.solve_adaptive(a.threshold, a.rounds, stats.as_deref_mut())?,
        None => {
            solver.solve(stats.as_deref_mut())?;
            0
        }
    };
    let voltage_map = match solver.layout() {
        Layout::Grid => Some(solver.end_voltage_map()?),
        Layout::SinglePixel => None,
    };
    let result = solver
        .result()
        .cloned()
        .ok_or_else(|| PvError::Decode("run finished without a result".into()))?;
    Ok(RunOutcome {
        result,
        voltage_map,
        gn: solver.gn(),
        mesh: solver.mesh().clone(),
        refinements,
    })
}

fn write_dump(dir: &Path, name: &str, text: &str) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(name), text)?;
    Ok(())
}
