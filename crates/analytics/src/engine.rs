use crate::error::AnalyticsError;
use crate::report::{
    Explanation, ImpactReport, InitiativeReport, MetricRecord, MetricsSection, NO_INITIATIVE,
};
use crate::stats;
use chrono::NaiveDateTime;
use core_types::{AnalysisPayload, Initiative, MetricCode, MetricRow};
use std::collections::BTreeMap;
use tracing::debug;

/// Default significance threshold, in standard deviations.
pub const DEFAULT_SIGMA: f64 = 3.0;

/// Overall-layer statistics for one metric, kept around so the initiative
/// layer can copy `overall_sig` without recomputing anything.
struct OverallStat {
    current_avg: f64,
    change: f64,
    significant: bool,
}

/// A stateless calculator turning a raw payload into an [`ImpactReport`].
#[derive(Debug)]
pub struct ImpactEngine {
    sigma: f64,
}

impl Default for ImpactEngine {
    fn default() -> Self {
        Self { sigma: DEFAULT_SIGMA }
    }
}

impl ImpactEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an engine with a non-default significance threshold.
    pub fn with_sigma(sigma: f64) -> Self {
        Self { sigma }
    }

    /// The main entry point.
    ///
    /// Computes the overall (reference vs current) layer for every
    /// recognized metric, then either splits the current window at each
    /// in-scope initiative's launch instant or falls back to the
    /// `NO_INITIATIVE` branch when nothing launched inside the window.
    ///
    /// # Errors
    ///
    /// Only structural problems error: unparsable timestamps, non-numeric
    /// values under a recognized metric code, or current rows without a
    /// date when an initiative split needs one. Numeric edge cases degrade
    /// to `0.0` instead.
    pub fn analyze(&self, payload: &AnalysisPayload) -> Result<ImpactReport, AnalyticsError> {
        let (start, end) = payload.window()?;

        let reference = pivot(&payload.reference_metrics)?;
        let current = pivot(&payload.current_metrics)?;

        // An initiative is in scope only if it launched inside the
        // reporting window, inclusive on both ends.
        let mut in_scope = Vec::new();
        for initiative in &payload.initiatives {
            let launch = initiative.launch_instant()?;
            if start <= launch && launch <= end {
                in_scope.push((initiative, launch));
            }
        }
        debug!(
            total = payload.initiatives.len(),
            in_scope = in_scope.len(),
            "scoped initiatives to reporting window"
        );

        let overall = self.overall_layer(&reference, &current);

        let mut report = ImpactReport::new();

        if in_scope.is_empty() {
            report.insert(NO_INITIATIVE.to_string(), no_initiative_report(&overall));
            return Ok(report);
        }

        // The split depends on each row's date, so it has to work on the
        // raw rows rather than the pivoted series. Dates are parsed once.
        let mut dated_rows = Vec::with_capacity(payload.current_metrics.len());
        for row in &payload.current_metrics {
            dated_rows.push((row.instant()?, row));
        }

        for (initiative, launch) in in_scope {
            let metrics = self.initiative_metrics(initiative, launch, &dated_rows, &overall)?;
            if metrics.is_empty() {
                // Nothing comparable on either side of the launch.
                debug!(initiative_id = %initiative.initiative_id, "no comparable metrics, omitting");
                continue;
            }
            report.insert(
                initiative.initiative_id.clone(),
                InitiativeReport {
                    initiative_name: Some(initiative.initiative_name.clone()),
                    overall: MetricsSection { metrics },
                },
            );
        }

        Ok(report)
    }

    /// Reference-vs-current statistics for every recognized metric.
    ///
    /// The spread here is the reference stdev normalized by the reference
    /// mean (a coefficient of variation), unlike the raw stdev used by the
    /// initiative layer. The two layers measure noise on different bases
    /// and must not be unified.
    fn overall_layer(
        &self,
        reference: &BTreeMap<MetricCode, Vec<f64>>,
        current: &BTreeMap<MetricCode, Vec<f64>>,
    ) -> BTreeMap<MetricCode, OverallStat> {
        let mut overall = BTreeMap::new();

        for code in MetricCode::ALL {
            let ref_series = &reference[&code];
            let cur_series = &current[&code];

            let ref_avg = stats::mean(ref_series);
            let cur_avg = stats::mean(cur_series);
            let change = stats::delta(ref_avg, cur_avg);

            // Same zero guard as delta: a zero reference mean yields zero
            // spread rather than a division fault.
            let spread = if ref_avg == 0.0 {
                0.0
            } else {
                stats::sample_stdev(ref_series) / ref_avg
            };
            let significant = stats::is_significant(change, spread, self.sigma);

            overall.insert(code, OverallStat { current_avg: cur_avg, change, significant });
        }

        overall
    }

    /// Pre/post-launch statistics for one initiative.
    ///
    /// Metrics lacking data on either side of the launch are skipped; the
    /// returned map may be empty, in which case the caller omits the
    /// initiative from the report.
    fn initiative_metrics(
        &self,
        initiative: &Initiative,
        launch: NaiveDateTime,
        dated_rows: &[(NaiveDateTime, &MetricRow)],
        overall: &BTreeMap<MetricCode, OverallStat>,
    ) -> Result<BTreeMap<MetricCode, MetricRecord>, AnalyticsError> {
        let mut metrics = BTreeMap::new();

        for code in MetricCode::ALL {
            let mut pre = Vec::new();
            let mut post = Vec::new();
            for (date, row) in dated_rows {
                if let Some(value) = row.value(code)? {
                    // Launch-day rows belong to the post window.
                    if *date < launch {
                        pre.push(value);
                    } else {
                        post.push(value);
                    }
                }
            }

            if pre.is_empty() || post.is_empty() {
                continue;
            }

            let pre_avg = stats::mean(&pre);
            let post_avg = stats::mean(&post);
            let change = stats::delta(pre_avg, post_avg);
            let spread = stats::sample_stdev(&pre);
            let significant = stats::is_significant(change, spread, self.sigma);
            let overall_sig = overall[&code].significant;

            metrics.insert(
                code,
                MetricRecord {
                    current_avg: stats::round4(post_avg),
                    change,
                    overall_sig,
                    initiative_sig: Some(significant),
                    explanation: classify(initiative, change, significant, overall_sig),
                },
            );
        }

        Ok(metrics)
    }
}

/// Turns list-of-rows into per-metric value series for the recognized codes,
/// preserving source row order and tolerating sparse rows.
fn pivot(rows: &[MetricRow]) -> Result<BTreeMap<MetricCode, Vec<f64>>, AnalyticsError> {
    let mut pivoted = BTreeMap::new();
    for code in MetricCode::ALL {
        let mut series = Vec::new();
        for row in rows {
            if let Some(value) = row.value(code)? {
                series.push(value);
            }
        }
        pivoted.insert(code, series);
    }
    Ok(pivoted)
}

/// Classification for the per-initiative branch.
fn classify(
    initiative: &Initiative,
    change: f64,
    initiative_sig: bool,
    overall_sig: bool,
) -> Explanation {
    if initiative_sig {
        Explanation::AttributedToInitiative {
            initiative_name: initiative.initiative_name.clone(),
            delta: change,
        }
    } else if overall_sig {
        Explanation::SignificantUnattributed
    } else {
        Explanation::NotMeaningful
    }
}

/// The fallback report when nothing launched inside the window: the
/// overall-layer records, classified through the no-initiative branch.
fn no_initiative_report(overall: &BTreeMap<MetricCode, OverallStat>) -> InitiativeReport {
    let mut metrics = BTreeMap::new();
    for (code, stat) in overall {
        let explanation = if stat.significant {
            Explanation::ExpansionWindowSuggested
        } else {
            Explanation::NotMeaningful
        };
        metrics.insert(
            *code,
            MetricRecord {
                current_avg: stats::round4(stat.current_avg),
                change: stat.change,
                overall_sig: stat.significant,
                initiative_sig: None,
                explanation,
            },
        );
    }
    InitiativeReport { initiative_name: None, overall: MetricsSection { metrics } }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> AnalysisPayload {
        serde_json::from_value(value).expect("payload should deserialize")
    }

    fn steady_baseline() -> serde_json::Value {
        // Mean 0.5 with a little spread, so the coefficient of variation is
        // non-zero and a 10% move stays under the 3-sigma bar.
        json!([
            {"bounce_rate": 0.50},
            {"bounce_rate": 0.55},
            {"bounce_rate": 0.45},
            {"bounce_rate": 0.52},
            {"bounce_rate": 0.48},
        ])
    }

    #[test]
    fn no_initiative_fallback_reports_overall_layer() {
        // Scenario A: a ~10% move against a noisy baseline, nothing launched.
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": steady_baseline(),
            "current_metrics": [
                {"date": "2024-02-01", "bounce_rate": 0.55},
                {"date": "2024-02-02", "bounce_rate": 0.56},
                {"date": "2024-02-03", "bounce_rate": 0.54},
                {"date": "2024-02-04", "bounce_rate": 0.55},
                {"date": "2024-02-05", "bounce_rate": 0.55},
            ],
        }));

        let report = ImpactEngine::new().analyze(&payload).unwrap();
        assert_eq!(report.len(), 1);

        let fallback = report.get(NO_INITIATIVE).expect("fallback key present");
        assert_eq!(fallback.initiative_name, None);

        let record = &fallback.overall.metrics[&MetricCode::BounceRate];
        assert_eq!(record.current_avg, 0.55);
        assert!((record.change - 0.10).abs() < 1e-9);
        assert_eq!(record.change_percent(), "+10.00%");
        assert_eq!(record.initiative_sig, None);
        // Baseline CV ~0.076, threshold ~0.23 > 0.10: not significant.
        assert!(!record.overall_sig);
        assert_eq!(record.explanation, Explanation::NotMeaningful);
    }

    #[test]
    fn large_post_launch_jump_is_attributed() {
        // Scenario B: conversion rate doubles right at launch.
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": [
                {"conversion_rate": 0.10},
                {"conversion_rate": 0.11},
                {"conversion_rate": 0.09},
                {"conversion_rate": 0.10},
            ],
            "current_metrics": [
                {"date": "2024-02-01", "conversion_rate": 0.10},
                {"date": "2024-02-02", "conversion_rate": 0.11},
                {"date": "2024-02-03", "conversion_rate": 0.09},
                {"date": "2024-02-04", "conversion_rate": 0.10},
                {"date": "2024-02-05", "conversion_rate": 0.20},
                {"date": "2024-02-06", "conversion_rate": 0.21},
                {"date": "2024-02-07", "conversion_rate": 0.19},
            ],
            "initiatives": [{
                "initiative_id": "init-42",
                "initiative_name": "Spring Sale",
                "launch_timestamp": "2024-02-05T00:00:00",
            }],
        }));

        let report = ImpactEngine::new().analyze(&payload).unwrap();
        let slice = report.get("init-42").expect("initiative present");
        assert_eq!(slice.initiative_name.as_deref(), Some("Spring Sale"));

        let record = &slice.overall.metrics[&MetricCode::ConversionRate];
        assert_eq!(record.initiative_sig, Some(true));
        assert_eq!(record.current_avg, 0.2);
        // Pre mean 0.1, post mean 0.2: a +100% jump.
        assert!((record.change - 1.0).abs() < 1e-9);
        match &record.explanation {
            Explanation::AttributedToInitiative { initiative_name, delta } => {
                assert_eq!(initiative_name, "Spring Sale");
                assert!((delta - record.change).abs() < 1e-12);
            }
            other => panic!("expected attribution, got {other:?}"),
        }
    }

    #[test]
    fn out_of_window_initiative_is_excluded() {
        // Scenario C: the launch predates the window, so the report falls
        // back to the NO_INITIATIVE branch.
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": steady_baseline(),
            "current_metrics": [
                {"date": "2024-02-01", "bounce_rate": 0.50},
                {"date": "2024-02-02", "bounce_rate": 0.51},
            ],
            "initiatives": [{
                "initiative_id": "too-early",
                "initiative_name": "January Push",
                "launch_timestamp": "2024-01-15T00:00:00",
            }],
        }));

        let report = ImpactEngine::new().analyze(&payload).unwrap();
        assert!(report.get("too-early").is_none());
        assert!(report.get(NO_INITIATIVE).is_some());
    }

    #[test]
    fn launch_day_rows_land_in_the_post_window() {
        // Two rows, launch exactly on the second row's date. The boundary
        // row must count as post, leaving exactly one row on each side.
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": [{"revenue": 100.0}],
            "current_metrics": [
                {"date": "2024-02-01", "revenue": 100.0},
                {"date": "2024-02-02", "revenue": 150.0},
            ],
            "initiatives": [{
                "initiative_id": "init-1",
                "initiative_name": "Launch",
                "launch_timestamp": "2024-02-02",
            }],
        }));

        let report = ImpactEngine::new().analyze(&payload).unwrap();
        let record = &report.get("init-1").unwrap().overall.metrics[&MetricCode::Revenue];
        // post = [150], pre = [100]
        assert_eq!(record.current_avg, 150.0);
        assert!((record.change - 0.5).abs() < 1e-12);
    }

    #[test]
    fn metric_without_pre_launch_data_is_omitted() {
        // Launch on the first row's date: no strictly-earlier rows, so the
        // metric (and with it the whole initiative) drops out even though
        // post-launch data exists.
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": [{"revenue": 100.0}],
            "current_metrics": [
                {"date": "2024-02-01", "revenue": 120.0},
                {"date": "2024-02-02", "revenue": 130.0},
            ],
            "initiatives": [{
                "initiative_id": "day-one",
                "initiative_name": "Day One",
                "launch_timestamp": "2024-02-01",
            }],
        }));

        let report = ImpactEngine::new().analyze(&payload).unwrap();
        // In scope but nothing comparable: omitted entirely, and the
        // fallback branch does not kick in for scoped-but-empty initiatives.
        assert!(report.is_empty());
    }

    #[test]
    fn overall_sig_is_copied_into_initiative_records() {
        // A flat pre-launch window (zero stdev) with any movement makes the
        // initiative significant; the overall flag must still come from the
        // reference-vs-current comparison.
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": steady_baseline(),
            "current_metrics": [
                {"date": "2024-02-01", "bounce_rate": 0.55},
                {"date": "2024-02-02", "bounce_rate": 0.55},
                {"date": "2024-02-03", "bounce_rate": 0.56},
            ],
            "initiatives": [{
                "initiative_id": "init-7",
                "initiative_name": "Tweak",
                "launch_timestamp": "2024-02-03",
            }],
        }));

        let report = ImpactEngine::new().analyze(&payload).unwrap();
        let record = &report.get("init-7").unwrap().overall.metrics[&MetricCode::BounceRate];
        assert_eq!(record.initiative_sig, Some(true));
        assert!(!record.overall_sig);
        assert!(matches!(
            record.explanation,
            Explanation::AttributedToInitiative { .. }
        ));
    }

    #[test]
    fn significant_but_unattributed_movement_is_flagged() {
        // Overall layer: flat baseline (zero CV) vs a higher current mean
        // makes the overall flag true. Initiative layer: a noisy pre-launch
        // window keeps the per-initiative flag false.
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": [
                {"unique_visitors": 1000.0},
                {"unique_visitors": 1000.0},
                {"unique_visitors": 1000.0},
            ],
            "current_metrics": [
                {"date": "2024-02-01", "unique_visitors": 900.0},
                {"date": "2024-02-02", "unique_visitors": 1500.0},
                {"date": "2024-02-03", "unique_visitors": 1100.0},
                {"date": "2024-02-04", "unique_visitors": 1180.0},
            ],
            "initiatives": [{
                "initiative_id": "init-9",
                "initiative_name": "Banner Refresh",
                "launch_timestamp": "2024-02-04",
            }],
        }));

        let report = ImpactEngine::new().analyze(&payload).unwrap();
        let record = &report.get("init-9").unwrap().overall.metrics[&MetricCode::UniqueVisitors];
        assert!(record.overall_sig);
        assert_eq!(record.initiative_sig, Some(false));
        assert_eq!(record.explanation, Explanation::SignificantUnattributed);
    }

    #[test]
    fn sparse_rows_are_tolerated_in_both_layers() {
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": [
                {"revenue": 100.0, "bounce_rate": 0.5},
                {"revenue": 110.0},
            ],
            "current_metrics": [
                {"date": "2024-02-01", "revenue": 105.0},
                {"date": "2024-02-02", "bounce_rate": 0.4},
                {"date": "2024-02-03", "revenue": 115.0},
            ],
            "initiatives": [{
                "initiative_id": "init-3",
                "initiative_name": "Sparse",
                "launch_timestamp": "2024-02-03",
            }],
        }));

        let report = ImpactEngine::new().analyze(&payload).unwrap();
        let slice = report.get("init-3").unwrap();
        // Revenue has one row on each side of the launch; bounce_rate has no
        // post-launch data and is skipped.
        assert!(slice.overall.metrics.contains_key(&MetricCode::Revenue));
        assert!(!slice.overall.metrics.contains_key(&MetricCode::BounceRate));
    }

    #[test]
    fn non_numeric_metric_value_is_an_error() {
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": [{"revenue": "broken"}],
            "current_metrics": [],
        }));

        let result = ImpactEngine::new().analyze(&payload);
        assert!(matches!(result, Err(AnalyticsError::InvalidInput(_))));
    }

    #[test]
    fn unparsable_launch_timestamp_is_an_error() {
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": [],
            "current_metrics": [],
            "initiatives": [{
                "initiative_id": "bad-ts",
                "initiative_name": "Broken",
                "launch_timestamp": "not a date",
            }],
        }));

        assert!(ImpactEngine::new().analyze(&payload).is_err());
    }

    #[test]
    fn zero_baseline_metrics_degrade_to_zero_change() {
        // No bounce_rate anywhere: means are 0, and the zero guards keep
        // every derived number finite.
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": [{"revenue": 0.0}, {"revenue": 0.0}],
            "current_metrics": [{"date": "2024-02-01", "revenue": 50.0}],
        }));

        let report = ImpactEngine::new().analyze(&payload).unwrap();
        let metrics = &report.get(NO_INITIATIVE).unwrap().overall.metrics;

        let revenue = &metrics[&MetricCode::Revenue];
        assert_eq!(revenue.change, 0.0);
        assert!(revenue.change.is_finite());
        // Zero delta against zero spread is not significant.
        assert!(!revenue.overall_sig);

        let absent = &metrics[&MetricCode::BounceRate];
        assert_eq!(absent.current_avg, 0.0);
        assert_eq!(absent.change, 0.0);
    }

    #[test]
    fn analysis_is_idempotent() {
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": steady_baseline(),
            "current_metrics": [
                {"date": "2024-02-01", "bounce_rate": 0.55, "revenue": 100.0},
                {"date": "2024-02-02", "bounce_rate": 0.54, "revenue": 120.0},
                {"date": "2024-02-03", "bounce_rate": 0.56, "revenue": 110.0},
            ],
            "initiatives": [{
                "initiative_id": "init-5",
                "initiative_name": "Rerun",
                "launch_timestamp": "2024-02-02T12:00:00",
            }],
        }));

        let engine = ImpactEngine::new();
        let first = engine.analyze(&payload).unwrap();
        let second = engine.analyze(&payload).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn custom_sigma_changes_the_verdict() {
        // Baseline CV ~0.076; a 10% move is insignificant at sigma=3 but
        // clears the bar at sigma=1.
        let payload = payload(json!({
            "start_date": "2024-02-01",
            "end_date": "2024-02-28",
            "reference_metrics": steady_baseline(),
            "current_metrics": [
                {"date": "2024-02-01", "bounce_rate": 0.55},
                {"date": "2024-02-02", "bounce_rate": 0.55},
            ],
        }));

        let strict = ImpactEngine::new().analyze(&payload).unwrap();
        let lenient = ImpactEngine::with_sigma(1.0).analyze(&payload).unwrap();

        let strict_rec = &strict.get(NO_INITIATIVE).unwrap().overall.metrics[&MetricCode::BounceRate];
        let lenient_rec = &lenient.get(NO_INITIATIVE).unwrap().overall.metrics[&MetricCode::BounceRate];
        assert!(!strict_rec.overall_sig);
        assert!(lenient_rec.overall_sig);
        assert_eq!(lenient_rec.explanation, Explanation::ExpansionWindowSuggested);
    }
}
