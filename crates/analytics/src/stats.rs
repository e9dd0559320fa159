//! The pure statistics primitives underneath both report layers.
//!
//! All of these are total over their documented domain: the division-by-zero
//! and short-series cases resolve to `0.0` instead of failing, so callers
//! never see infinities or NaN from this module.

/// Signed ratio change from `baseline_avg` to `comparison_avg`.
///
/// `+0.12` means +12%, `-0.05` means -5%. A zero baseline yields exactly
/// `0.0` rather than a division fault.
pub fn delta(baseline_avg: f64, comparison_avg: f64) -> f64 {
    if baseline_avg == 0.0 {
        return 0.0;
    }
    (comparison_avg - baseline_avg) / baseline_avg
}

/// Bessel-corrected (n-1) sample standard deviation.
///
/// Fewer than 2 samples carry no spread information; that case is `0.0`.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>()
        / (values.len() as f64 - 1.0);
    variance.sqrt()
}

/// Heuristic significance test: `|delta| > sigma * stdev`.
///
/// With `stdev == 0.0` any non-zero delta counts as significant. That is an
/// aggressive policy for flat baselines, but it is the contract: a change
/// against zero observed variance is never dismissed as noise.
pub fn is_significant(delta: f64, stdev: f64, sigma: f64) -> bool {
    delta.abs() > sigma * stdev
}

/// Arithmetic mean, `0.0` for an empty series.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Rounds to 4 decimal places, the precision of `current_avg` in the report.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
