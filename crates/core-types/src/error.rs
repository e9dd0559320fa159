use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unparsable timestamp: '{0}'")]
    InvalidTimestamp(String),

    #[error("Metric '{metric}' holds a non-numeric value: {value}")]
    NonNumericValue { metric: String, value: String },

    #[error("Metric row is missing its 'date' field")]
    MissingRowDate,
}
