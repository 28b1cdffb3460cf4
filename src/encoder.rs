//! Netlist encoder.
//!
//! Turns aggregated tiles into circuit directives. Every tile contributes one
//! diode stack (one level per junction) connected to its row and column
//! neighbours through the top and bottom sheet resistances. Tiles covered by
//! metal also join the metal grid through a contact resistor, and bus-bar
//! tiles tie that grid to the bias node.
//!
//! Output is a pure function of the inputs: the decoder finds results by node
//! name alone, so identical tiles must always produce identical text.

use std::fmt::Write as _;

use crate::config::{DeviceConfig, EncoderToggles, SweepConfig};
use crate::ir::{Directive, SpiceNumber, Value};
use crate::naming::{NodeNamer, Terminal, BIAS_NODE, BIAS_SOURCE, GROUND};
use crate::tile::{Tile, TileKind};

/// Title comment at the top of every netlist.
pub const TITLE: &str = "pvcircuit quasi-3D network";

/// Where a tile sits relative to its neighbours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Neighbors {
    /// No tile below (last row).
    pub boundary_row: bool,
    /// No tile to the right (last column).
    pub boundary_col: bool,
    /// The tile below exists and carries metal.
    pub metal_row: bool,
    /// The tile to the right exists and carries metal.
    pub metal_col: bool,
}

impl Neighbors {
    /// Derive neighbour flags for tile `(row, col)` of a `kinds` grid.
    pub fn of(kinds: &[Vec<TileKind>], row: usize, col: usize) -> Self {
        let below = kinds.get(row + 1).and_then(|r| r.get(col));
        let right = kinds.get(row).and_then(|r| r.get(col + 1));
        Self {
            boundary_row: below.is_none(),
            boundary_col: right.is_none(),
            metal_row: below.is_some_and(|k| k.is_metal()),
            metal_col: right.is_some_and(|k| k.is_metal()),
        }
    }

    /// An isolated tile with no neighbours.
    pub fn isolated() -> Self {
        Self {
            boundary_row: true,
            boundary_col: true,
            metal_row: false,
            metal_col: false,
        }
    }
}

/// Directive builder for one solver pass.
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    namer: NodeNamer,
    toggles: EncoderToggles,
    /// Normalization constant applied to all currents.
    gn: f64,
    /// Physical area of one raster pixel.
    pixel_area: f64,
}

impl Encoder {
    pub fn new(namer: NodeNamer, toggles: EncoderToggles, gn: f64, pixel_area: f64) -> Self {
        Self {
            namer,
            toggles,
            gn,
            pixel_area,
        }
    }

    pub fn namer(&self) -> &NodeNamer {
        &self.namer
    }

    pub fn gn(&self) -> f64 {
        self.gn
    }

    /// Junction-level diode models, the temperature card and the bias source.
    ///
    /// Saturation currents are those of a single pixel.
    pub fn create_header(&self, params: &DeviceConfig, temperature: f64) -> String {
        let mut out = String::new();
        push(&mut out, &Directive::Comment(TITLE.into()));
        out.push('\n');
        for j in 0..params.junctions() {
            let scale = self.pixel_area * self.gn;
            for d in diode_models(&format!("{}", j), params, j, scale) {
                push(&mut out, &d);
            }
        }
        let _ = writeln!(out, ".OPTIONS TNOM=20 TEMP={}", SpiceNumber(temperature));
        out.push('\n');
        push(
            &mut out,
            &Directive::VoltageSource {
                name: BIAS_SOURCE.into(),
                nodes: (BIAS_NODE.into(), GROUND.into()),
                dc: 0.0,
            },
        );
        out
    }

    /// The bias-current probe and the sweep command.
    pub fn create_exec(&self, sweep: &SweepConfig) -> String {
        format!(
            ".PRINT DC i({})\n.DC {} {} {} {}\n",
            BIAS_SOURCE,
            BIAS_SOURCE,
            SpiceNumber(sweep.start),
            SpiceNumber(sweep.end),
            SpiceNumber(sweep.step)
        )
    }

    /// Per-tile diode models whose saturation currents scale with tile area.
    pub fn tile_models(&self, tile: &Tile, params: &DeviceConfig) -> Vec<Directive> {
        let scale = tile.area() * self.gn;
        (0..params.junctions())
            .flat_map(|j| {
                let loc = self.namer.loc(j, tile.row, tile.col);
                diode_models(&loc, params, j, scale)
            })
            .collect()
    }

    /// All directives of one tile, junction by junction, ending with its
    /// voltage probe.
    pub fn create_node(&self, tile: &Tile, params: &DeviceConfig, neighbors: Neighbors) -> Vec<Directive> {
        let (row, col) = (tile.row, tile.col);
        let junctions = params.junctions();
        let area = tile.area();
        let s = tile.dx / tile.dy;
        let gn = self.gn;
        let mut out = Vec::new();

        for j in 0..junctions {
            let loc = self.namer.loc(j, row, col);
            let top = self.namer.node(Terminal::Top, j, row, col);
            let bot = self.namer.node(Terminal::Bottom, j, row, col);
            let loc_row = self.namer.loc(j, row + 1, col);
            let loc_col = self.namer.loc(j, row, col + 1);

            out.push(Directive::Diode {
                name: format!("d1_{}", loc),
                nodes: (top.clone(), bot.clone()),
                model: format!("diode1_{}", loc),
                off: false,
            });
            if self.toggles.second_diode {
                out.push(Directive::Diode {
                    name: format!("d2_{}", loc),
                    nodes: (top.clone(), bot.clone()),
                    model: format!("diode2_{}", loc),
                    off: false,
                });
            }
            out.push(Directive::CurrentSource {
                name: format!("i{}", loc),
                nodes: (bot.clone(), top.clone()),
                value: Value::Number(params.jsc[j] * self.pixel_area * gn),
            });
            if self.toggles.shunt_resistor {
                out.push(resistor(
                    format!("Rshunt_{}", loc),
                    &top,
                    &bot,
                    params.r_shunt[j] / area / gn,
                ));
            }

            let rs_top = params.rs_top[j] / gn;
            let rs_bot = params.rs_bot[j] / gn;
            if !neighbors.boundary_row {
                out.push(resistor(
                    format!("RtX{}to{}", loc, loc_row),
                    &top,
                    &self.namer.node(Terminal::Top, j, row + 1, col),
                    rs_top / s,
                ));
            }
            if !neighbors.boundary_col {
                out.push(resistor(
                    format!("RtY{}to{}", loc, loc_col),
                    &top,
                    &self.namer.node(Terminal::Top, j, row, col + 1),
                    rs_top * s,
                ));
            }
            if !neighbors.boundary_row {
                out.push(resistor(
                    format!("RbX{}to{}", loc, loc_row),
                    &bot,
                    &self.namer.node(Terminal::Bottom, j, row + 1, col),
                    rs_bot / s,
                ));
            }
            if !neighbors.boundary_col {
                out.push(resistor(
                    format!("RbY{}to{}", loc, loc_col),
                    &bot,
                    &self.namer.node(Terminal::Bottom, j, row, col + 1),
                    rs_bot * s,
                ));
            }

            let low = if j + 1 == junctions {
                GROUND.to_string()
            } else {
                self.namer.node(Terminal::Top, j + 1, row, col)
            };
            let r_series = if self.toggles.series_resistor {
                params.r_series[j] / area / gn
            } else {
                0.0
            };
            out.push(resistor(format!("Rseries{}to{}", loc, low), &bot, &low, r_series));

            if j == 0 && tile.kind.is_metal() {
                self.metal_links(tile, params, neighbors, &mut out);
            }

            let mut probe = vec![top, bot];
            if j == 0 && tile.kind.is_metal() {
                probe.push(self.namer.node(Terminal::Metal, 0, row, col));
            }
            out.push(Directive::Probe { nodes: probe });
        }
        out
    }

    fn metal_links(&self, tile: &Tile, params: &DeviceConfig, neighbors: Neighbors, out: &mut Vec<Directive>) {
        let (row, col) = (tile.row, tile.col);
        let loc = self.namer.loc(0, row, col);
        let top = self.namer.node(Terminal::Top, 0, row, col);
        let metal = self.namer.node(Terminal::Metal, 0, row, col);

        let contact = params.r_contact / (tile.area() * tile.metal.coverage) / self.gn;
        push_finite(out, resistor(format!("Rcontact{}", loc), &top, &metal, contact));

        if !neighbors.boundary_row && neighbors.metal_row {
            push_finite(
                out,
                resistor(
                    format!("RbusX{}to{}", loc, self.namer.loc(0, row + 1, col)),
                    &metal,
                    &self.namer.node(Terminal::Metal, 0, row + 1, col),
                    tile.metal.along_rows,
                ),
            );
        }
        if !neighbors.boundary_col && neighbors.metal_col {
            push_finite(
                out,
                resistor(
                    format!("RbusY{}to{}", loc, self.namer.loc(0, row, col + 1)),
                    &metal,
                    &self.namer.node(Terminal::Metal, 0, row, col + 1),
                    tile.metal.along_cols,
                ),
            );
        }
        if tile.kind == TileKind::Bus {
            out.push(resistor(format!("Rext{}", loc), BIAS_NODE, &metal, 0.0));
        }
    }

    /// Models plus node directives of one tile, rendered as text.
    pub fn encode_tile(&self, tile: &Tile, params: &DeviceConfig, neighbors: Neighbors) -> String {
        let mut out = String::new();
        for d in self.tile_models(tile, params) {
            push(&mut out, &d);
        }
        for d in self.create_node(tile, params, neighbors) {
            push(&mut out, &d);
            if matches!(d, Directive::Probe { .. }) {
                out.push('\n');
            }
        }
        out
    }
}

fn diode_models(suffix: &str, params: &DeviceConfig, j: usize, scale: f64) -> [Directive; 2] {
    [
        Directive::DiodeModel {
            name: format!("diode1_{}", suffix),
            is: params.j01[j] * scale,
            n: params.n1[j],
            eg: params.eg[j],
        },
        Directive::DiodeModel {
            name: format!("diode2_{}", suffix),
            is: params.j02[j] * scale,
            n: params.n2[j],
            eg: params.eg[j],
        },
    ]
}

fn resistor(name: String, a: &str, b: &str, value: f64) -> Directive {
    Directive::Resistor {
        name,
        nodes: (a.to_string(), b.to_string()),
        value,
    }
}

// An infinite resistor is an open circuit.
fn push_finite(out: &mut Vec<Directive>, d: Directive) {
    if let Directive::Resistor { value, .. } = &d {
        if !value.is_finite() {
            return;
        }
    }
    out.push(d);
}

fn push(out: &mut String, d: &Directive) {
    let _ = writeln!(out, "{}", d);
}
