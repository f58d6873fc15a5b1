//! Public API layer: the entry points for running and resuming flows.

mod runner;

pub use crate::core::scheduler::RunOutcome;
pub use runner::{FlowRunner, FlowRunnerBuilder};
