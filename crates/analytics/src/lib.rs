//! # Uplift Analytics Engine
//!
//! This crate computes launch-impact metrics for marketing initiatives by
//! comparing a baseline (reference) KPI window against the current window.
//! It is the numeric heart of the system: everything downstream (narrative
//! generation, validation, linting) consumes the report it produces.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic Crate:** No I/O, no clock reads, no external calls. It
//!   depends only on `core-types`. Given the same payload it produces a
//!   byte-identical report, so it is safe to call concurrently from any
//!   number of callers.
//! - **Graceful Degradation:** Numeric edge cases (zero baselines, short
//!   series) resolve to `0.0` instead of failing. The engine only errors on
//!   structurally invalid input such as unparsable timestamps or
//!   non-numeric metric values.
//! - **Symbolic Explanations:** Every metric record carries a closed
//!   classification code, never prose. Rendering the codes into sentences
//!   belongs to the narrative stage, not here.
//!
//! ## Public API
//!
//! - `ImpactEngine`: The main struct that contains the calculation logic.
//! - `ImpactReport` / `MetricRecord` / `Explanation`: The report structure
//!   handed off to the narrative stage.
//! - `AnalyticsError`: The specific error types that can be returned from
//!   this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod report;
pub mod stats;

// Re-export the key components to create a clean, public-facing API.
pub use engine::{DEFAULT_SIGMA, ImpactEngine};
pub use error::AnalyticsError;
pub use report::{Explanation, ImpactReport, InitiativeReport, MetricRecord, NO_INITIATIVE};
