//! Error types for the flow engine.
//!
//! - [`NodeError`]: Errors raised while a single node unit is invoked.
//! - [`FlowError`]: Run-level errors: graph validation, scheduling, resume and ledger failures.

pub mod flow_error;
pub mod node_error;

pub use flow_error::FlowError;
pub use node_error::NodeError;

/// Convenience alias for run-level results.
pub type FlowResult<T> = Result<T, FlowError>;
/// Convenience alias for node-level results.
pub type NodeResult<T> = Result<T, NodeError>;
