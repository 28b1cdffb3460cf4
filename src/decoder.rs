//! Solver output decoder.
//!
//! Reads the text tables an ngspice-style engine prints for `.PRINT DC`:
//!
//! ```text
//! No. of Data Rows : 3
//! ...
//! Index   v-sweep         v(t_0_000_000)  v(b_0_000_000)
//! --------------------------------------------------------------------------------
//! 0       0.000000e+00    1.0e-01         2.0e-01
//! 1       5.000000e-01    1.1e-01         2.1e-01
//! 2       1.000000e+00    1.2e-01         2.2e-01
//! ```
//!
//! Every table becomes one `Trace` per probe column, keyed by node name with
//! the `v(..)` wrapper removed. Branch currents keep their printed name
//! (`vdep#branch`). Tables may come in any order; a header repeated inside an
//! open table (a page break) is ignored.

use std::collections::HashMap;

use tracing::{debug, warn};

/// One probe column of a sweep table.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// Swept variable at every row.
    pub sweep: Vec<f64>,
    /// Probe value at every row.
    pub values: Vec<f64>,
}

/// All traces found in one solver output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedOutput {
    /// Declared row count, if the marker was seen.
    pub rows: Option<usize>,
    traces: HashMap<String, Trace>,
}

impl DecodedOutput {
    pub fn get(&self, name: &str) -> Option<&Trace> {
        self.traces.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.traces.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.traces.keys().map(String::as_str)
    }
}

struct OpenBlock {
    header: Vec<String>,
    sweep: Vec<f64>,
    columns: Vec<Vec<f64>>,
}

impl OpenBlock {
    fn new(header: Vec<String>, rows: usize) -> Self {
        let columns = vec![vec![f64::NAN; rows]; header.len()];
        Self {
            header,
            sweep: vec![f64::NAN; rows],
            columns,
        }
    }
}

/// Strip `v(..)` from a column name.
fn column_name(raw: &str) -> String {
    raw.strip_prefix("v(")
        .or_else(|| raw.strip_prefix("V("))
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(raw)
        .to_string()
}

fn row_marker(line: &str) -> Option<usize> {
    let rest = line.trim().strip_prefix("No. of Data Rows")?;
    rest.trim_start().strip_prefix(':')?.trim().parse().ok()
}

/// Column names of a table header, without `Index` and the sweep column.
fn table_header(line: &str) -> Option<Vec<String>> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    if !first.eq_ignore_ascii_case("index") {
        return None;
    }
    tokens.next()?;
    let names: Vec<String> = tokens.map(column_name).collect();
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

/// `(index, sweep, values)` of a data row with exactly `width` probe columns.
fn data_row(line: &str, width: usize) -> Option<(usize, f64, Vec<f64>)> {
    let mut tokens = line.split_whitespace();
    let index: usize = tokens.next()?.parse().ok()?;
    let sweep: f64 = tokens.next()?.parse().ok()?;
    let values: Vec<f64> = tokens.map(|t| t.parse().ok()).collect::<Option<_>>()?;
    if values.len() != width {
        return None;
    }
    Some((index, sweep, values))
}

/// Decode every sweep table in `raw`.
///
/// Nothing before the row-count marker is considered. Tables cut short are
/// discarded with a warning.
pub fn parse_output(raw: &str) -> DecodedOutput {
    let mut out = DecodedOutput::default();
    let mut block: Option<OpenBlock> = None;

    for line in raw.lines() {
        let Some(rows) = out.rows else {
            out.rows = row_marker(line);
            continue;
        };

        if let Some(header) = table_header(line) {
            let repeated = block.as_ref().is_some_and(|open| open.header == header);
            if !repeated {
                if let Some(open) = &block {
                    warn!(columns = ?open.header, "discarding incomplete output table");
                }
                block = Some(OpenBlock::new(header, rows));
            }
            continue;
        }

        let Some(open) = block.as_mut() else {
            continue;
        };
        let Some((index, sweep, values)) = data_row(line, open.header.len()) else {
            continue;
        };
        if index >= rows {
            warn!(index, rows, "output row index beyond declared row count");
            continue;
        }
        open.sweep[index] = sweep;
        for (column, v) in open.columns.iter_mut().zip(values) {
            column[index] = v;
        }

        if index + 1 == rows {
            if let Some(done) = block.take() {
                for (name, values) in done.header.into_iter().zip(done.columns) {
                    out.traces.insert(
                        name,
                        Trace {
                            sweep: done.sweep.clone(),
                            values,
                        },
                    );
                }
            }
        }
    }

    if let Some(open) = block {
        warn!(columns = ?open.header, "output ended inside a table");
    }
    debug!(rows = ?out.rows, traces = out.traces.len(), "solver output decoded");
    out
}
