//! Error types for policy evaluation.

use thiserror::Error;

/// Errors returned by [`PolicyEngine`](super::PolicyEngine) and the status parser.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("invalid job status '{0}'")]
    InvalidStatus(String),

    #[error("invalid completion percentage {0}")]
    InvalidCompletionPercentage(f64),
}
