use thiserror::Error;

/// Node-level errors
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Node executor not found for type: {0}")]
    ExecutorNotFound(String),
    #[error("Execution error: {0}")]
    ExecutionError(String),
    #[error("Template error: {0}")]
    TemplateError(String),
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl NodeError {
    /// An explicit cancellation is recorded as TERMINATED rather than ERROR.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, NodeError::Cancelled(_))
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(e: serde_json::Error) -> Self {
        NodeError::SerializationError(e.to_string())
    }
}
