//! Refinable rectangular partition of the device raster.
//!
//! A mesh holds one boundary sequence per axis over a fixed raster extent.
//! Tile `i` along an axis spans `[b[i], b[i + 1])`, with the last tile running
//! to the extent. Boundaries only ever grow by local bisection; every prior
//! boundary set is kept in `history`.

use tracing::{debug, warn};

use crate::error::{PvError, Result};

/// Mesh axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Row,
    Col,
}

impl Axis {
    pub fn from_dim(dim: usize) -> Result<Self> {
        match dim {
            0 => Ok(Axis::Row),
            1 => Ok(Axis::Col),
            _ => Err(PvError::Mesh(format!("dimension must be 0 or 1, got {}", dim))),
        }
    }
}

/// Bounding box of one tile in raster pixels, half-open on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBox {
    pub r0: usize,
    pub r1: usize,
    pub c0: usize,
    pub c1: usize,
}

impl TileBox {
    pub fn rows(&self) -> usize {
        self.r1 - self.r0
    }

    pub fn cols(&self) -> usize {
        self.c1 - self.c0
    }
}

/// Outcome of a `refine` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refinement {
    /// New boundaries were inserted at these positions.
    Refined(Vec<usize>),
    /// No adjacent pair crossed the threshold; the mesh is unchanged.
    Unchanged,
}

impl Refinement {
    pub fn is_refined(&self) -> bool {
        matches!(self, Refinement::Refined(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    rows: Vec<usize>,
    cols: Vec<usize>,
    extent: (usize, usize),
    history: Vec<(Axis, Vec<usize>)>,
}

impl Mesh {
    /// Uniform mesh with boundaries at `0, rw, 2rw, ...` below the extent.
    pub fn uniform(extent: (usize, usize), rw: usize, cw: usize) -> Result<Self> {
        if rw == 0 || cw == 0 {
            return Err(PvError::Mesh("step size must be positive".into()));
        }
        if extent.0 == 0 || extent.1 == 0 {
            return Err(PvError::Mesh(format!(
                "raster extent must be non-empty, got {}x{}",
                extent.0, extent.1
            )));
        }
        Ok(Self {
            rows: (0..extent.0).step_by(rw).collect(),
            cols: (0..extent.1).step_by(cw).collect(),
            extent,
            history: Vec::new(),
        })
    }

    /// Mesh from explicit boundary sequences.
    pub fn from_boundaries(extent: (usize, usize), rows: Vec<usize>, cols: Vec<usize>) -> Result<Self> {
        validate(&rows, extent.0, "row")?;
        validate(&cols, extent.1, "column")?;
        Ok(Self {
            rows,
            cols,
            extent,
            history: Vec::new(),
        })
    }

    /// One tile per pixel.
    pub fn single_pixel() -> Self {
        Self {
            rows: vec![0],
            cols: vec![0],
            extent: (1, 1),
            history: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    pub fn extent(&self) -> (usize, usize) {
        self.extent
    }

    /// Number of tiles along each axis.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.cols.len())
    }

    /// Boundary sets replaced by earlier refinements, oldest first.
    pub fn history(&self) -> &[(Axis, Vec<usize>)] {
        &self.history
    }

    pub fn boundaries(&self, axis: Axis) -> &[usize] {
        match axis {
            Axis::Row => &self.rows,
            Axis::Col => &self.cols,
        }
    }

    /// Bounding box of every tile, row-major.
    pub fn to_coordset(&self) -> Vec<Vec<TileBox>> {
        let row_spans = spans(&self.rows, self.extent.0);
        let col_spans = spans(&self.cols, self.extent.1);
        row_spans
            .iter()
            .map(|&(r0, r1)| {
                col_spans
                    .iter()
                    .map(|&(c0, c1)| TileBox { r0, r1, c0, c1 })
                    .collect()
            })
            .collect()
    }

    /// Bisect every tile pair along `axis` whose sampled values differ by at
    /// least `threshold`.
    ///
    /// `values` holds one sample per current boundary. This is local bisection
    /// only: oscillations narrower than the current spacing are not detected.
    pub fn refine(&mut self, values: &[f64], threshold: f64, axis: Axis) -> Result<Refinement> {
        let extent = match axis {
            Axis::Row => self.extent.0,
            Axis::Col => self.extent.1,
        };
        let current = match axis {
            Axis::Row => &self.rows,
            Axis::Col => &self.cols,
        };
        if values.len() != current.len() {
            return Err(PvError::Mesh(format!(
                "refine expects {} samples along {:?}, got {}",
                current.len(),
                axis,
                values.len()
            )));
        }

        let inserted: Vec<usize> = values
            .windows(2)
            .enumerate()
            .filter(|(_, w)| (w[1] - w[0]).abs() >= threshold)
            .map(|(i, _)| (current[i] + current[i + 1]) / 2)
            .filter(|b| !current.contains(b))
            .collect();

        if inserted.is_empty() {
            warn!(?axis, threshold, "no refinement performed");
            return Ok(Refinement::Unchanged);
        }

        let mut next = current.clone();
        next.extend_from_slice(&inserted);
        next.sort_unstable();
        next.dedup();
        validate(&next, extent, "refined")?;

        debug!(?axis, added = inserted.len(), tiles = next.len(), "mesh refined");
        let previous = match axis {
            Axis::Row => std::mem::replace(&mut self.rows, next),
            Axis::Col => std::mem::replace(&mut self.cols, next),
        };
        self.history.push((axis, previous));
        Ok(Refinement::Refined(inserted))
    }
}

fn spans(bounds: &[usize], extent: usize) -> Vec<(usize, usize)> {
    bounds
        .iter()
        .enumerate()
        .map(|(i, &b)| (b, bounds.get(i + 1).copied().unwrap_or(extent)))
        .collect()
}

fn validate(bounds: &[usize], extent: usize, what: &str) -> Result<()> {
    if bounds.first() != Some(&0) {
        return Err(PvError::Mesh(format!("{} boundaries must start at 0", what)));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(PvError::Mesh(format!(
            "{} boundaries must be strictly increasing",
            what
        )));
    }
    if bounds.last().is_some_and(|&b| b >= extent) {
        return Err(PvError::Mesh(format!(
            "{} boundaries must lie inside the raster extent {}",
            what, extent
        )));
    }
    Ok(())
}
