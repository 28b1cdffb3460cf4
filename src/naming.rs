//! Node identifier scheme.
//!
//! Grid nodes are keyed by (junction, row, column). Rows and columns are
//! rendered zero-padded to a fixed width so that every key is unique and the
//! decoder can look nodes up by string alone. A width of `w` digits admits at
//! most `10^w` rows and columns; `NodeNamer::check_grid` enforces that bound.

use crate::error::{PvError, Result};

/// SPICE ground.
pub const GROUND: &str = "0";
/// Node the bus bars are tied to, driven by the bias source.
pub const BIAS_NODE: &str = "in";
/// Name of the swept bias voltage source.
pub const BIAS_SOURCE: &str = "vdep";
/// Default zero-padding width for row/column fields.
pub const DEFAULT_WIDTH: usize = 3;

/// Terminal of a junction within one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Terminal {
    /// Upper conduction layer of the junction.
    Top,
    /// Lower conduction layer of the junction.
    Bottom,
    /// Metal contact over the tile (junction 0 only).
    Metal,
}

impl Terminal {
    fn prefix(self) -> &'static str {
        match self {
            Terminal::Top => "t",
            Terminal::Bottom => "b",
            Terminal::Metal => "m",
        }
    }
}

/// Renders node keys for a grid with a fixed padding width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeNamer {
    width: usize,
}

impl Default for NodeNamer {
    fn default() -> Self {
        Self { width: DEFAULT_WIDTH }
    }
}

impl NodeNamer {
    pub fn new(width: usize) -> Result<Self> {
        if width == 0 || width > 9 {
            return Err(PvError::Naming(format!(
                "padding width must be between 1 and 9, got {}",
                width
            )));
        }
        Ok(Self { width })
    }

    /// The narrowest namer (never below the default width) that fits a grid.
    pub fn for_grid(rows: usize, cols: usize) -> Self {
        let largest = rows.max(cols).saturating_sub(1);
        let digits = largest.to_string().len();
        Self {
            width: digits.max(DEFAULT_WIDTH),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Largest row or column count this width can name without collisions.
    pub fn max_dimension(&self) -> usize {
        10usize.pow(self.width as u32)
    }

    /// Fail if a grid of the given size would overflow the padded fields.
    pub fn check_grid(&self, rows: usize, cols: usize) -> Result<()> {
        let max = self.max_dimension();
        if rows > max || cols > max {
            return Err(PvError::Naming(format!(
                "{}x{} grid exceeds the {}-digit node naming limit of {} per axis",
                rows, cols, self.width, max
            )));
        }
        Ok(())
    }

    /// Location key `"{junction}_{row}_{col}"` shared by every element of a tile.
    pub fn loc(&self, junction: usize, row: usize, col: usize) -> String {
        format!(
            "{}_{:0w$}_{:0w$}",
            junction,
            row,
            col,
            w = self.width
        )
    }

    /// Full node name, e.g. `t_0_001_002`.
    pub fn node(&self, terminal: Terminal, junction: usize, row: usize, col: usize) -> String {
        format!("{}_{}", terminal.prefix(), self.loc(junction, row, col))
    }

    /// Key the decoder uses for the junction-0 top node of a tile.
    pub fn probe_key(&self, row: usize, col: usize) -> String {
        self.node(Terminal::Top, 0, row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_node_names() {
        let namer = NodeNamer::default();
        assert_eq!(namer.node(Terminal::Top, 0, 1, 2), "t_0_001_002");
        assert_eq!(namer.node(Terminal::Bottom, 2, 10, 0), "b_2_010_000");
        assert_eq!(namer.node(Terminal::Metal, 0, 999, 999), "m_0_999_999");
        assert_eq!(namer.probe_key(0, 1), "t_0_000_001");
    }

    #[test]
    fn test_names_unique_within_limit() {
        let namer = NodeNamer::new(1).unwrap();
        let mut seen = HashSet::new();
        for j in 0..3 {
            for r in 0..10 {
                for c in 0..10 {
                    assert!(seen.insert(namer.node(Terminal::Top, j, r, c)));
                }
            }
        }
    }

    #[test]
    fn test_check_grid_rejects_overflow() {
        let namer = NodeNamer::default();
        assert!(namer.check_grid(1000, 1000).is_ok());
        let err = namer.check_grid(1001, 5).unwrap_err();
        assert!(matches!(err, PvError::Naming(_)));
    }

    #[test]
    fn test_for_grid_widens_when_needed() {
        assert_eq!(NodeNamer::for_grid(10, 10).width(), 3);
        assert_eq!(NodeNamer::for_grid(1000, 10).width(), 3);
        assert_eq!(NodeNamer::for_grid(1001, 10).width(), 4);
        let namer = NodeNamer::for_grid(12000, 3);
        assert!(namer.check_grid(12000, 3).is_ok());
    }

    #[test]
    fn test_invalid_width() {
        assert!(NodeNamer::new(0).is_err());
        assert!(NodeNamer::new(10).is_err());
    }
}
