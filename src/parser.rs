//! Netlist line parser.
//!
//! Parses the subset of SPICE that the encoder emits back into `Directive`s.
//!
//! # Supported syntax
//!
//! ```text
//! * comment line
//! Rname n+ n- value                 (resistor)
//! Dname n+ n- model [OFF]           (diode)
//! Iname n+ n- value|symbol          (current source)
//! Vname n+ n- [DC] value            (voltage source)
//! .model name d(is=..,n=..,eg=..)   (diode model)
//! .PRINT DC v(a) [v(b) ...]         (voltage probe)
//! ```
//!
//! Any other line (`.OPTIONS`, `.DC`, `.PRINT DC i(..)`, `.end`, ...) is
//! reported as `Line::Other` so callers can pass it through untouched.
//!
//! Values support engineering suffixes: T, G, MEG, K, M, U, N, P, F
//! (case-insensitive).

use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while1};
use nom::character::complete::space1;
use nom::combinator::{map, opt};
use nom::multi::many1;
use nom::number::complete::double;
use nom::sequence::{delimited, preceded};
use nom::IResult;
use nom::Parser;

use crate::error::{PvError, Result};
use crate::ir::{Directive, Value};

/// Classification of one netlist line.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Blank,
    Directive(Directive),
    /// A line outside the directive grammar (control cards, current probes,
    /// the sweep command, the terminator).
    Other,
}

/// Parse one netlist line.
///
/// Lines whose leading character claims a device kind but whose tokens do not
/// fit that kind's grammar are errors carrying the offending text; lines that
/// claim no known kind are `Line::Other`.
pub fn parse_line(raw_line: &str) -> Result<Line> {
    let line = raw_line.trim();
    if line.is_empty() {
        return Ok(Line::Blank);
    }
    if let Some(text) = line.strip_prefix('*') {
        return Ok(Line::Directive(Directive::Comment(text.trim().to_string())));
    }

    let first = line.chars().next().unwrap_or(' ');
    let parsed = match first.to_ascii_uppercase() {
        'R' => parse_resistor_line(line),
        'D' => parse_diode_line(line),
        'I' => parse_isource_line(line),
        'V' => parse_vsource_line(line),
        '.' => {
            let upper = line.to_uppercase();
            if upper.starts_with(".MODEL") {
                parse_model_command(line)
            } else if upper.starts_with(".PRINT") {
                match parse_probe_command(line) {
                    Some(probe) => Ok(probe),
                    None => return Ok(Line::Other),
                }
            } else {
                return Ok(Line::Other);
            }
        }
        _ => return Ok(Line::Other),
    };

    parsed
        .map(Line::Directive)
        .map_err(|detail| PvError::Parse(format!("{} in: {}", detail, raw_line)))
}

/// Parse every directive of a netlist, failing on the first malformed line.
pub fn parse_netlist(input: &str) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();
    for (line_num, raw_line) in input.lines().enumerate() {
        if raw_line.trim().eq_ignore_ascii_case(".end") {
            break;
        }
        match parse_line(raw_line) {
            Ok(Line::Directive(d)) => directives.push(d),
            Ok(_) => {}
            Err(PvError::Parse(msg)) => {
                return Err(PvError::Parse(format!("line {}: {}", line_num + 1, msg)))
            }
            Err(e) => return Err(e),
        }
    }
    Ok(directives)
}

// ---------------------------------------------------------------------------
// Engineering suffix value parser
// ---------------------------------------------------------------------------

/// Parse a numeric value with optional engineering suffix.
/// Handles: 10k, 100n, 4.7u, 1MEG, 1e3, -3.3, etc.
pub(crate) fn eng_value(input: &str) -> IResult<&str, f64> {
    let (rest, num) = double(input)?;
    let (rest, suffix) = opt(eng_suffix).parse(rest)?;
    let multiplier = suffix.unwrap_or(1.0);
    Ok((rest, num * multiplier))
}

/// Match an engineering suffix and return its multiplier.
fn eng_suffix(input: &str) -> IResult<&str, f64> {
    // Order matters: MEG must come before M
    alt((
        map(tag_no_case("MEG"), |_: &str| 1e6),
        map(tag_no_case("T"), |_: &str| 1e12),
        map(tag_no_case("G"), |_: &str| 1e9),
        map(tag_no_case("K"), |_: &str| 1e3),
        map(tag_no_case("M"), |_: &str| 1e-3),
        map(tag_no_case("U"), |_: &str| 1e-6),
        map(tag_no_case("N"), |_: &str| 1e-9),
        map(tag_no_case("P"), |_: &str| 1e-12),
        map(tag_no_case("F"), |_: &str| 1e-15),
    ))
    .parse(input)
}

/// A value token must be followed by whitespace or the end of the line.
fn complete_value(input: &str) -> std::result::Result<f64, String> {
    let (rest, value) = eng_value(input).map_err(|_| "failed to parse value".to_string())?;
    if !rest.trim().is_empty() {
        return Err(format!("unexpected trailing text '{}'", rest.trim()));
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Token parsers
// ---------------------------------------------------------------------------

/// Parse a node identifier (e.g. "0", "in", "t_0_000_001", "sn3").
fn node_id(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '#')(input)
}

/// Parse an element name (everything up to the first whitespace).
fn element_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

/// Parse `name n+ n-` followed by at least one space, returning the rest.
fn two_terminal(line: &str) -> std::result::Result<(&str, (&str, &str, &str)), String> {
    let (rest, (name, _, n_plus, _, n_minus, _)) =
        (element_name, space1, node_id, space1, node_id, space1)
            .parse(line)
            .map_err(|_: nom::Err<nom::error::Error<&str>>| {
                "expected '<name> <node> <node> <value>'".to_string()
            })?;
    Ok((rest, (name, n_plus, n_minus)))
}

// ---------------------------------------------------------------------------
// Device parsing
// ---------------------------------------------------------------------------

/// Parse a line like: Rname n+ n- value
fn parse_resistor_line(line: &str) -> std::result::Result<Directive, String> {
    let (rest, (name, n_plus, n_minus)) = two_terminal(line)?;
    let value = complete_value(rest).map_err(|e| format!("resistor: {}", e))?;
    Ok(Directive::Resistor {
        name: name.to_string(),
        nodes: (n_plus.to_string(), n_minus.to_string()),
        value,
    })
}

/// Parse a diode line: Dname anode cathode MODELNAME [OFF]
fn parse_diode_line(line: &str) -> std::result::Result<Directive, String> {
    let (rest, (name, anode, cathode)) = two_terminal(line)?;
    let (rest, model) = node_id(rest)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| "diode: expected model name".to_string())?;
    let off = match rest.trim() {
        "" => false,
        flag if flag.eq_ignore_ascii_case("OFF") => true,
        other => return Err(format!("diode: unexpected trailing text '{}'", other)),
    };
    Ok(Directive::Diode {
        name: name.to_string(),
        nodes: (anode.to_string(), cathode.to_string()),
        model: model.to_string(),
        off,
    })
}

/// Parse a current source: Iname n+ n- value, where value may be symbolic.
fn parse_isource_line(line: &str) -> std::result::Result<Directive, String> {
    let (rest, (name, n_plus, n_minus)) = two_terminal(line)?;
    let rest = rest.trim();
    let rest = match rest.get(..2) {
        Some(kw) if kw.eq_ignore_ascii_case("DC") && rest.len() > 2 => rest[2..].trim_start(),
        _ => rest,
    };
    let value = match complete_value(rest) {
        Ok(v) => Value::Number(v),
        Err(_) if !rest.is_empty() && !rest.contains(char::is_whitespace) => {
            Value::Symbol(rest.to_string())
        }
        Err(e) => return Err(format!("current source: {}", e)),
    };
    Ok(Directive::CurrentSource {
        name: name.to_string(),
        nodes: (n_plus.to_string(), n_minus.to_string()),
        value,
    })
}

/// Parse a voltage source: Vname n+ n- [DC] value
fn parse_vsource_line(line: &str) -> std::result::Result<Directive, String> {
    let (rest, (name, n_plus, n_minus)) = two_terminal(line)?;
    let rest = rest.trim();
    let rest = match rest.get(..2) {
        Some(kw) if kw.eq_ignore_ascii_case("DC") => rest[2..].trim_start(),
        _ => rest,
    };
    let dc = complete_value(rest).map_err(|e| format!("voltage source: {}", e))?;
    Ok(Directive::VoltageSource {
        name: name.to_string(),
        nodes: (n_plus.to_string(), n_minus.to_string()),
        dc,
    })
}

// ---------------------------------------------------------------------------
// Dot-command parsing
// ---------------------------------------------------------------------------

/// Parse: .model name d(is=val,n=val,eg=val)
fn parse_model_command(line: &str) -> std::result::Result<Directive, String> {
    let rest = line[6..].trim_start();

    let (rest, model_name) =
        node_id(rest).map_err(|_: nom::Err<nom::error::Error<&str>>| {
            "expected model name after .model".to_string()
        })?;
    let rest = rest.trim_start();

    if !rest.get(..1).is_some_and(|t| t.eq_ignore_ascii_case("d")) {
        return Err(format!("unsupported model type in '{}', only d is supported", rest));
    }
    let rest = rest[1..].trim_start();

    let params = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or("expected parenthesised model parameters")?;

    let mut is = None;
    let mut n = None;
    let mut eg = None;
    for token in params.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let (key, val) = token
            .split_once('=')
            .ok_or_else(|| format!("malformed model parameter '{}'", token))?;
        let (_, value) =
            eng_value(val).map_err(|_| format!("failed to parse {} value: {}", key, val))?;
        match key.to_ascii_lowercase().as_str() {
            "is" => is = Some(value),
            "n" => n = Some(value),
            "eg" => eg = Some(value),
            other => return Err(format!("unknown model parameter: {}", other)),
        }
    }

    Ok(Directive::DiodeModel {
        name: model_name.to_string(),
        is: is.ok_or("model is missing is=")?,
        n: n.unwrap_or(1.0),
        eg: eg.unwrap_or(1.11),
    })
}

/// Parse: .PRINT DC v(a) [v(b) ...]
///
/// Returns `None` for print cards that are not pure voltage probes
/// (for example `.PRINT DC i(vdep)`).
fn parse_probe_command(line: &str) -> Option<Directive> {
    let (rest, nodes) = probe_nodes(line).ok()?;
    if !rest.trim().is_empty() {
        return None;
    }
    Some(Directive::Probe {
        nodes: nodes.into_iter().map(str::to_string).collect(),
    })
}

fn probe_nodes(input: &str) -> IResult<&str, Vec<&str>> {
    preceded(
        (tag_no_case(".PRINT"), space1, tag_no_case("DC")),
        many1(preceded(
            space1,
            delimited(tag_no_case("v("), node_id, tag(")")),
        )),
    )
    .parse(input)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
