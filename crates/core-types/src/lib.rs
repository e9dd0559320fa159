pub mod enums;
pub mod error;
pub mod payload;

// Re-export the core types to provide a clean public API.
pub use enums::MetricCode;
pub use error::CoreError;
pub use payload::{AnalysisPayload, Initiative, MetricRow, parse_instant};
