//! Results output formatting (CSV).

use std::io::Write;

use ndarray::Array2;

use crate::error::Result;
use crate::orchestrator::{RunOutcome, SolveResult};
use crate::scan::ScanRow;

/// Write the terminal I-V curve as CSV.
///
/// Format:
/// ```csv
/// V,I
/// 0,3.4e-10
/// 0.5,3.3e-10
/// ```
pub fn write_iv_csv<W: Write>(result: &SolveResult, writer: &mut W) -> Result<()> {
    writeln!(writer, "V,I")?;
    for (v, i) in result.v.iter().zip(&result.i) {
        writeln!(writer, "{},{}", v, i)?;
    }
    Ok(())
}

/// Write a per-tile map as CSV, one line per tile row.
pub fn write_map_csv<W: Write>(map: &Array2<f64>, writer: &mut W) -> Result<()> {
    for row in map.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", line.join(","))?;
    }
    Ok(())
}

/// Write one run: the I-V curve, then the final voltage map if there is one,
/// separated by a blank line.
pub fn write_run_csv<W: Write>(outcome: &RunOutcome, writer: &mut W) -> Result<()> {
    write_iv_csv(&outcome.result, writer)?;
    if let Some(map) = &outcome.voltage_map {
        writeln!(writer)?;
        write_map_csv(map, writer)?;
    }
    Ok(())
}

/// Write a scan summary as CSV.
///
/// Format:
/// ```csv
/// illumination,rw,pmax,voc,error
/// 1,10,3.1e-10,1.02,
/// 10,10,,,solver timed out after 60s
/// ```
pub fn write_scan_csv<W: Write>(rows: &[ScanRow<RunOutcome>], writer: &mut W) -> Result<()> {
    let names: Vec<&str> = rows
        .first()
        .map(|r| r.params.keys().map(String::as_str).collect())
        .unwrap_or_default();

    for name in &names {
        write!(writer, "{},", name)?;
    }
    writeln!(writer, "pmax,voc,error")?;

    for row in rows {
        for name in &names {
            match row.params.get(*name) {
                Some(v) => write!(writer, "{},", v)?,
                None => write!(writer, ",")?,
            }
        }
        match &row.outcome {
            Ok(outcome) => {
                let voc = outcome
                    .result
                    .open_circuit_voltage()
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                writeln!(writer, "{},{},", outcome.result.max_power(), voc)?;
            }
            Err(e) => writeln!(writer, ",,{}", e.to_string().replace(',', ";"))?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PvError;
    use crate::mesh::Mesh;
    use crate::scan::ParamPoint;
    use ndarray::array;

    fn outcome() -> RunOutcome {
        RunOutcome {
            result: SolveResult {
                v: vec![0.0, 0.5, 1.0],
                i: vec![2.0, 1.0, -1.0],
                v_junc: None,
                missing_tiles: Vec::new(),
            },
            voltage_map: Some(array![[0.1, 0.2], [0.3, 0.4]]),
            gn: 1.0,
            mesh: Mesh::single_pixel(),
            refinements: 0,
        }
    }

    #[test]
    fn test_run_csv() {
        let mut buf = Vec::new();
        write_run_csv(&outcome(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "V,I\n0,2\n0.5,1\n1,-1\n\n0.1,0.2\n0.3,0.4\n");
    }

    #[test]
    fn test_scan_csv() {
        let mut p = ParamPoint::new();
        p.insert("illumination".into(), 1.0);
        let mut q = ParamPoint::new();
        q.insert("illumination".into(), 10.0);
        let rows = vec![
            ScanRow {
                params: p,
                outcome: Ok(outcome()),
            },
            ScanRow {
                params: q,
                outcome: Err(PvError::Config("bad, worse".into())),
            },
        ];
        let mut buf = Vec::new();
        write_scan_csv(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "illumination,pmax,voc,error");
        assert_eq!(lines[1], "1,0.5,0.75,");
        assert!(lines[2].starts_with("10,,,"));
        assert!(!lines[2]["10,,,".len()..].contains(','));
    }
}
