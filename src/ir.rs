//! Circuit directive representation.
//!
//! Every line of a generated netlist is one `Directive`. The encoder builds
//! directives and renders them with `Display`; the reducer parses text back
//! into directives, rewrites node references and renders them again, so the
//! rendered form is the single canonical template for each kind.

use std::fmt;

/// Node identifier in the netlist (e.g., "0", "in", "t_0_000_001").
pub type NodeId = String;

/// Formats a float the way it is written into a netlist: plain decimal for
/// moderate magnitudes, exponent form otherwise, `0` for zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpiceNumber(pub f64);

impl fmt::Display for SpiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        let mag = v.abs();
        if v == 0.0 {
            f.write_str("0")
        } else if (1e-3..1e6).contains(&mag) {
            write!(f, "{}", v)
        } else {
            write!(f, "{:e}", v)
        }
    }
}

/// Numeric or symbolic value carried by a two-terminal device.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Symbol(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", SpiceNumber(*v)),
            Value::Symbol(s) => f.write_str(s),
        }
    }
}

/// A single netlist line.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Resistor {
        name: String,
        nodes: (NodeId, NodeId),
        value: f64,
    },
    Diode {
        name: String,
        nodes: (NodeId, NodeId),
        model: String,
        off: bool,
    },
    /// Independent current source flowing from the first node to the second
    /// through the source.
    CurrentSource {
        name: String,
        nodes: (NodeId, NodeId),
        value: Value,
    },
    /// Independent DC voltage source.
    VoltageSource {
        name: String,
        nodes: (NodeId, NodeId),
        dc: f64,
    },
    /// `.model <name> d(is=..,n=..,eg=..)`
    DiodeModel {
        name: String,
        is: f64,
        n: f64,
        eg: f64,
    },
    /// `.PRINT DC v(a) [v(b) ...]`
    Probe { nodes: Vec<NodeId> },
    Comment(String),
}

impl Directive {
    /// The two terminals of a device directive.
    pub fn terminals(&self) -> Option<(&NodeId, &NodeId)> {
        match self {
            Directive::Resistor { nodes, .. }
            | Directive::Diode { nodes, .. }
            | Directive::CurrentSource { nodes, .. }
            | Directive::VoltageSource { nodes, .. } => Some((&nodes.0, &nodes.1)),
            _ => None,
        }
    }

    pub fn terminals_mut(&mut self) -> Option<(&mut NodeId, &mut NodeId)> {
        match self {
            Directive::Resistor { nodes, .. }
            | Directive::Diode { nodes, .. }
            | Directive::CurrentSource { nodes, .. }
            | Directive::VoltageSource { nodes, .. } => Some((&mut nodes.0, &mut nodes.1)),
            _ => None,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Resistor { name, nodes, value } => {
                write!(f, "{} {} {} {}", name, nodes.0, nodes.1, SpiceNumber(*value))
            }
            Directive::Diode { name, nodes, model, off } => {
                write!(f, "{} {} {} {}", name, nodes.0, nodes.1, model)?;
                if *off {
                    f.write_str(" OFF")?;
                }
                Ok(())
            }
            Directive::CurrentSource { name, nodes, value } => {
                write!(f, "{} {} {} {}", name, nodes.0, nodes.1, value)
            }
            Directive::VoltageSource { name, nodes, dc } => {
                write!(f, "{} {} {} DC {}", name, nodes.0, nodes.1, SpiceNumber(*dc))
            }
            Directive::DiodeModel { name, is, n, eg } => {
                write!(
                    f,
                    ".model {} d(is={},n={},eg={})",
                    name,
                    SpiceNumber(*is),
                    SpiceNumber(*n),
                    SpiceNumber(*eg)
                )
            }
            Directive::Probe { nodes } => {
                f.write_str(".PRINT DC")?;
                for node in nodes {
                    write!(f, " v({})", node)?;
                }
                Ok(())
            }
            Directive::Comment(text) => write!(f, "* {}", text),
        }
    }
}
