use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Structurally invalid input: bad timestamps, non-numeric metric
    /// values, or current rows without a date where the initiative split
    /// needs one.
    #[error(transparent)]
    InvalidInput(#[from] CoreError),
}
