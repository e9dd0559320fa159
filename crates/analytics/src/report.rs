use core_types::MetricCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Report key used when no initiative falls inside the reporting window.
pub const NO_INITIATIVE: &str = "NO_INITIATIVE";

/// Symbolic classification attached to every emitted metric record.
///
/// These codes are the whole vocabulary the narrative stage may render into
/// prose; the engine never produces natural language itself. The attributed
/// variant carries the initiative name and the raw delta so the renderer can
/// interpolate them into its templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Explanation {
    /// Significant overall movement with no initiative to pin it on; the
    /// change may be carryover from earlier initiatives or external factors,
    /// so a wider date window is worth trying.
    ExpansionWindowSuggested,
    /// The change falls within the usual range.
    NotMeaningful,
    /// The post-launch movement clears the significance bar for this
    /// specific initiative.
    AttributedToInitiative { initiative_name: String, delta: f64 },
    /// The metric moved significantly overall, but the movement does not
    /// line up with this initiative's launch.
    SignificantUnattributed,
}

/// One metric's computed statistics within a single report layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Current-window mean (post-launch mean in the initiative layer),
    /// rounded to 4 decimals.
    pub current_avg: f64,
    /// Signed ratio change (+0.12 = +12%). Kept as a raw ratio so downstream
    /// consumers get full precision; use [`MetricRecord::change_percent`]
    /// for display.
    pub change: f64,
    /// Significance of the reference-vs-current comparison. Identical across
    /// all initiatives for a given metric.
    pub overall_sig: bool,
    /// Significance of the pre/post-launch split. Only present in the
    /// per-initiative layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiative_sig: Option<bool>,
    pub explanation: Explanation,
}

impl MetricRecord {
    /// Boundary formatting of `change` as a signed percentage, e.g. `+10.00%`.
    pub fn change_percent(&self) -> String {
        format!("{:+.2}%", self.change * 100.0)
    }
}

/// The per-initiative (or `NO_INITIATIVE`) slice of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiativeReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiative_name: Option<String>,
    pub overall: MetricsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSection {
    pub metrics: BTreeMap<MetricCode, MetricRecord>,
}

/// The full report: initiative id (or `NO_INITIATIVE`) to its metrics.
///
/// Backed by an ordered map so repeated runs over the same payload
/// serialize byte-identically. This structure is the single hand-off
/// contract to the narrative pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImpactReport {
    initiatives: BTreeMap<String, InitiativeReport>,
}

impl ImpactReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, initiative_id: String, report: InitiativeReport) {
        self.initiatives.insert(initiative_id, report);
    }

    pub fn get(&self, initiative_id: &str) -> Option<&InitiativeReport> {
        self.initiatives.get(initiative_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &InitiativeReport)> {
        self.initiatives.iter()
    }

    pub fn len(&self) -> usize {
        self.initiatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initiatives.is_empty()
    }
}
