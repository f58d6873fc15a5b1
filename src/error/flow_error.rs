//! Run-level error types.

use crate::core::ledger::LedgerError;
use thiserror::Error;

/// Run-level errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("DSL parse error: {0}")]
    DslParseError(String),
    #[error("Unsupported DSL version: {found}, supported versions: {supported}")]
    UnsupportedVersion { found: String, supported: String },
    #[error("Graph build error: {0}")]
    GraphBuildError(String),
    #[error("No start node found")]
    NoStartNode,
    #[error("Multiple start nodes found: {}", .0.join(", "))]
    MultipleStartNodes(Vec<String>),
    #[error("Node not found: {0}")]
    NodeNotFound(String),
    #[error("Node execution error: node={node_id}, error={error}")]
    NodeExecutionError { node_id: String, error: String },
    #[error("Run cancelled before node {node_id}")]
    Cancelled { node_id: String },
    #[error("Resume rejected for execution '{execution_id}': {reason}")]
    ResumeRejected { execution_id: String, reason: String },
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),
    #[error("Max iterations exceeded: {0}")]
    MaxIterationsExceeded(usize),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl FlowError {
    /// Validation errors are raised before any node is scheduled.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FlowError::GraphBuildError(_)
                | FlowError::NoStartNode
                | FlowError::MultipleStartNodes(_)
        )
    }
}
