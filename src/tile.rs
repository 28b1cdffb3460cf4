//! Per-tile aggregation of the metal mask and illumination.
//!
//! Each mesh tile collapses many raster pixels into one circuit node. This
//! module derives what the encoder needs from the pixels under a tile:
//! metal coverage, lumped metal resistance along both axes, summed
//! illumination, and the tile classification.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis as NdAxis};

use crate::error::{PvError, Result};
use crate::mesh::TileBox;

/// Lumped metal resistance of one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelResistance {
    /// Resistance between horizontally adjacent tiles (current flows along a
    /// row, crossing columns).
    pub along_cols: f64,
    /// Resistance between vertically adjacent tiles (current flows down a
    /// column, crossing rows).
    pub along_rows: f64,
    /// Fraction of pixels above the metal threshold.
    pub coverage: f64,
}

impl PixelResistance {
    pub const NO_METAL: PixelResistance = PixelResistance {
        along_cols: f64::INFINITY,
        along_rows: f64::INFINITY,
        coverage: 0.0,
    };

    /// `(along_cols, along_rows, coverage)`
    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.along_cols, self.along_rows, self.coverage)
    }
}

/// Aggregate the metal resistance of a tile.
///
/// Every column of metal pixels is a series chain of `r_row` resistors; the
/// chains are then combined in parallel. Rows are treated the same way with
/// `r_col`. Lines with no metal are excluded from the parallel sum.
pub fn get_pixel_r(subimage: ArrayView2<f64>, r_row: f64, r_col: f64, threshold: f64) -> PixelResistance {
    let metal = subimage.mapv(|px| u32::from(px > threshold));
    let count = metal.sum();
    if count == 0 || subimage.is_empty() {
        return PixelResistance::NO_METAL;
    }

    let coverage = f64::from(count) / subimage.len() as f64;
    let per_col = metal.sum_axis(NdAxis(0));
    let per_row = metal.sum_axis(NdAxis(1));

    PixelResistance {
        along_rows: parallel(per_col.iter().copied(), r_row),
        along_cols: parallel(per_row.iter().copied(), r_col),
        coverage,
    }
}

fn parallel(chain_lengths: impl Iterator<Item = u32>, r: f64) -> f64 {
    let conductance: f64 = chain_lengths
        .filter(|&n| n > 0)
        .map(|n| 1.0 / (f64::from(n) * r))
        .sum();
    1.0 / conductance
}

/// Circuit role of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    /// Photoactive only.
    Normal,
    /// Covered by a metal finger; joins the metal grid.
    Finger,
    /// Covered by a bus bar; the metal grid is tied to the bias node here.
    Bus,
}

impl TileKind {
    pub fn is_metal(self) -> bool {
        !matches!(self, TileKind::Normal)
    }
}

/// Thresholds used to classify tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    /// Pixels above this value count as metal; tiles whose coverage exceeds
    /// it are metal-covered.
    pub metal_threshold: f64,
    /// A metal tile whose brightest pixel exceeds this is a bus bar.
    pub bus_intensity: f64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            metal_threshold: 0.0,
            bus_intensity: 250.0,
        }
    }
}

impl Classifier {
    pub fn classify(&self, subimage: ArrayView2<f64>, coverage: f64) -> TileKind {
        if coverage <= self.metal_threshold {
            return TileKind::Normal;
        }
        let peak = subimage.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if peak > self.bus_intensity {
            TileKind::Bus
        } else {
            TileKind::Finger
        }
    }
}

/// Everything the encoder needs about one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub row: usize,
    pub col: usize,
    pub bbox: TileBox,
    /// Physical extent along rows and columns, in device-length units.
    pub dy: f64,
    pub dx: f64,
    pub metal: PixelResistance,
    pub kind: TileKind,
}

impl Tile {
    /// Aggregate one tile of `mask`. `pixel_lr`/`pixel_lc` are the physical
    /// pixel sizes along rows/columns, `r_metal` the resistance of one metal
    /// pixel.
    #[allow(clippy::too_many_arguments)]
    pub fn aggregate(
        mask: ArrayView2<f64>,
        row: usize,
        col: usize,
        bbox: TileBox,
        pixel_lr: f64,
        pixel_lc: f64,
        r_metal: f64,
        classifier: &Classifier,
    ) -> Self {
        let sub = mask.slice(ndarray::s![bbox.r0..bbox.r1, bbox.c0..bbox.c1]);
        let metal = get_pixel_r(sub, r_metal, r_metal, classifier.metal_threshold);
        let kind = classifier.classify(sub, metal.coverage);
        Self {
            row,
            col,
            bbox,
            dy: bbox.rows() as f64 * pixel_lr,
            dx: bbox.cols() as f64 * pixel_lc,
            metal,
            kind,
        }
    }

    pub fn area(&self) -> f64 {
        self.dx * self.dy
    }
}

fn check_shape(illumination: (usize, usize), mask: (usize, usize)) -> Result<()> {
    if illumination != mask {
        return Err(PvError::Mesh(format!(
            "illumination shape {:?} does not match mask shape {:?}",
            illumination, mask
        )));
    }
    Ok(())
}

/// Sum the illumination inside every tile, counting only pixels where the
/// mask exceeds `threshold`.
pub fn resize_illumination(
    illumination: ArrayView2<f64>,
    mask: ArrayView2<f64>,
    coordset: &[Vec<TileBox>],
    threshold: f64,
) -> Result<Array2<f64>> {
    check_shape(illumination.dim(), mask.dim())?;
    let rows = coordset.len();
    let cols = coordset.first().map_or(0, Vec::len);
    let mut out = Array2::zeros((rows, cols));
    for (r, row) in coordset.iter().enumerate() {
        for (c, b) in row.iter().enumerate() {
            let ill = illumination.slice(ndarray::s![b.r0..b.r1, b.c0..b.c1]);
            let m = mask.slice(ndarray::s![b.r0..b.r1, b.c0..b.c1]);
            out[[r, c]] = ill
                .iter()
                .zip(m.iter())
                .filter(|(_, &mv)| mv > threshold)
                .map(|(&iv, _)| iv)
                .sum();
        }
    }
    Ok(out)
}

/// `resize_illumination` applied to every wavelength slice (last axis).
pub fn resize_illumination_3d(
    illumination: ArrayView3<f64>,
    mask: ArrayView2<f64>,
    coordset: &[Vec<TileBox>],
    threshold: f64,
) -> Result<Array3<f64>> {
    let (h, w, nz) = illumination.dim();
    check_shape((h, w), mask.dim())?;
    let rows = coordset.len();
    let cols = coordset.first().map_or(0, Vec::len);
    let mut out = Array3::zeros((rows, cols, nz));
    for z in 0..nz {
        let slice = resize_illumination(
            illumination.index_axis(NdAxis(2), z),
            mask,
            coordset,
            threshold,
        )?;
        out.index_axis_mut(NdAxis(2), z).assign(&slice);
    }
    Ok(out)
}
