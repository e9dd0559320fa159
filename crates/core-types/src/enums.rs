use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of KPI codes tracked by the engine.
///
/// Any metric key outside this set is ignored during pivoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCode {
    BounceRate,
    ConversionRate,
    Revenue,
    SearchConversionRate,
    UniqueVisitors,
}

impl MetricCode {
    /// All recognized codes, in pivot order.
    pub const ALL: [MetricCode; 5] = [
        MetricCode::BounceRate,
        MetricCode::ConversionRate,
        MetricCode::Revenue,
        MetricCode::SearchConversionRate,
        MetricCode::UniqueVisitors,
    ];

    /// Returns the wire name of this code, as it appears as a payload key.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCode::BounceRate => "bounce_rate",
            MetricCode::ConversionRate => "conversion_rate",
            MetricCode::Revenue => "revenue",
            MetricCode::SearchConversionRate => "search_conversion_rate",
            MetricCode::UniqueVisitors => "unique_visitors",
        }
    }
}

impl fmt::Display for MetricCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
