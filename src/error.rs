//! Crate-wide error taxonomy.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the accumulation, valuation, and aggregation pipeline.
///
/// Empty inputs are never an error; they degrade to empty or zeroed output.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid price, fee, capacity, starting charge, or date range.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// A ledger row or event that cannot be accounted for as supplied.
    #[error("malformed row `{key}`: {reason}")]
    MalformedRow {
        /// Period key or timestamp identifying the offending row.
        key: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl EngineError {
    pub(crate) fn config(field: &str, message: impl Into<String>) -> Self {
        Self::Configuration(ConfigError {
            field: field.to_string(),
            message: message.into(),
        })
    }

    pub(crate) fn malformed(key: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRow {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
