use thiserror::Error;

use crate::types::FlowId;
use crate::validator::ValidationIssue;

/// Errors surfaced by the engine's public operations.
///
/// Validation problems and step failures are not errors at this boundary:
/// validation results are returned as data, and step failures are recorded
/// on their step and the run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Flow not found: {0}")]
    FlowNotFound(FlowId),

    #[error("Flow failed validation with {} issue(s)", .0.len())]
    InvalidFlow(Vec<ValidationIssue>),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}
