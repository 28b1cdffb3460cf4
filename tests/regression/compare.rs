/// Tolerance parameters for comparison.
pub struct Tolerances {
    pub rel_tol: f64,
    pub abs_tol: f64,
}

/// One sweep point of two I-V curves side by side.
pub struct PointComparison {
    pub v: f64,
    pub reduced: f64,
    pub full: f64,
    pub abs_error: f64,
    pub rel_error: f64,
    pub passed: bool,
}

/// Check if a value is within tolerance of reference.
/// Pass condition: abs(value - ref) <= max(rel_tol * abs(ref), abs_tol)
pub fn within_tolerance(value: f64, reference: f64, tol: &Tolerances) -> bool {
    let err = (value - reference).abs();
    let limit = (tol.rel_tol * reference.abs()).max(tol.abs_tol);
    err <= limit
}

/// Compare the curve solved from the reduced netlist against the one solved
/// from the unreduced netlist, point by point.
pub fn compare_curves(v: &[f64], reduced: &[f64], full: &[f64], tol: &Tolerances) -> Vec<PointComparison> {
    assert_eq!(reduced.len(), full.len(), "curves differ in length");
    v.iter()
        .zip(reduced.iter().zip(full))
        .map(|(&v, (&r, &f))| {
            let abs_error = (r - f).abs();
            let rel_error = if f.abs() > 1e-30 { abs_error / f.abs() } else { 0.0 };
            PointComparison {
                v,
                reduced: r,
                full: f,
                abs_error,
                rel_error,
                passed: within_tolerance(r, f, tol),
            }
        })
        .collect()
}

/// Format curve comparison failures as a diagnostic table (only show failures).
pub fn format_report(results: &[PointComparison]) -> String {
    let failures: Vec<_> = results.iter().filter(|r| !r.passed).collect();
    if failures.is_empty() {
        return "All sweep points passed.\n".to_string();
    }
    let mut s = String::new();
    s.push_str(&format!(
        "{:<10} {:>14} {:>14} {:>12} {:>10}\n",
        "V", "Reduced", "Full", "Abs Error", "Rel Error"
    ));
    s.push_str(&"-".repeat(64));
    s.push('\n');
    for r in failures {
        s.push_str(&format!(
            "{:<10.4} {:>14.6e} {:>14.6e} {:>12.6e} {:>9.4}%\n",
            r.v,
            r.reduced,
            r.full,
            r.abs_error,
            r.rel_error * 100.0
        ));
    }
    s
}
