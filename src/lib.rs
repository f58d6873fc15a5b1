//! # agentflow: an agent-flow scheduler
//!
//! `agentflow` runs flows of node units described by a YAML/JSON/TOML DSL.
//! The scheduler is event driven: a node becomes ready as soon as every
//! required parent has produced its output, and a branch-decision node may
//! prune the paths it did not select. On top of that it supports:
//!
//! - **Join semantics**: required parents are waited for, alternatives behind
//!   a decision node are satisfied by whichever branch arrives.
//! - **Bounded loops**: loop nodes jump back to an earlier node until the
//!   target's loop budget is spent, then fall through with a fallback message.
//! - **Iteration**: an iteration node runs its body once per element, each in
//!   an isolated scope, and merges the per-element state back.
//! - **Human checkpoints**: a run stops at a checkpoint and resumes later
//!   from the execution ledger with the human's answer.
//! - **Cancellation**: an [`AbortSignal`] ends the run as `TERMINATED`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use agentflow::{parse_dsl, DslFormat, FlowRunner, HumanInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let yaml = std::fs::read_to_string("flow.yaml")?;
//!     let schema = parse_dsl(&yaml, DslFormat::Yaml)?;
//!     let outcome = FlowRunner::builder(schema.clone()).run().await?;
//!     println!("{:?}", outcome.status);
//!
//!     let resumed = FlowRunner::builder(schema)
//!         .resume(outcome.execution_id, HumanInput::proceed())
//!         .run()
//!         .await?;
//!     println!("{:?}", resumed.output);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod core;
pub mod dsl;
pub mod error;
pub mod graph;
pub mod nodes;

pub use crate::api::{FlowRunner, FlowRunnerBuilder, RunOutcome};
pub use crate::core::ledger::{
    aggregate_status, EntryStatus, ExecutionRecord, FileLedgerStore, IterationTag, LedgerEntry,
    LedgerError, LedgerStore, MemoryLedgerStore, ResumeAction, RunStatus,
};
pub use crate::core::{
    create_event_channel, AbortSignal, EngineConfig, EventReceiver, EventSender, FakeIdGenerator,
    FakeTimeProvider, FlowEvent, FlowScheduler, IdGenerator, RealIdGenerator, RealTimeProvider,
    RunContext, RunRuntimeState, RuntimeContext, TimeProvider, DEFAULT_LOOP_FALLBACK,
};
pub use crate::dsl::{
    parse_dsl, ChatMessage, ConditionOutcome, DslFormat, FlowSchema, HumanDecision, HumanInput,
    LoopTarget, NodeOutput, NodeRunResult,
};
pub use crate::error::{FlowError, NodeError};
pub use crate::graph::{build_graph, FlowDefinition, FlowGraph};
pub use crate::nodes::{
    ConfigResolver, NodeExecutor, NodeExecutorRegistry, NodeInvoker, TemplateResolver,
};
