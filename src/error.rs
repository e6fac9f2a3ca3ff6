//! Error types for the rulestream crate.

use thiserror::Error;

/// Errors produced while constructing a learner.
///
/// Data conditions (missing values, anomalous instances, drift) are never
/// errors; they are handled inline by the training loop. The only fallible
/// surface is configuration validation.
#[derive(Debug, Error)]
pub enum RulestreamError {
    #[error("invalid config value for `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },
}

impl RulestreamError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
