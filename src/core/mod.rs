//! Core scheduling: the ready queue and waiting-node table, input combination,
//! the execution ledger, resume planning, events and the runtime context.

pub mod abort;
pub mod combiner;
pub mod event_bus;
pub mod ledger;
pub mod resume;
pub mod run_state;
pub mod runtime_context;
pub mod scheduler;
pub mod waiting;

pub use abort::AbortSignal;
pub use combiner::combine_inputs;
pub use event_bus::{create_event_channel, EventEmitter, EventReceiver, EventSender, FlowEvent};
pub use resume::{check_resumable, plan_resume, prepare_resume, ResumePlan, ResumeStep};
pub use run_state::{IterationContext, RunContext, RunRuntimeState};
pub use runtime_context::{
    FakeIdGenerator, FakeTimeProvider, IdGenerator, RealIdGenerator, RealTimeProvider,
    RuntimeContext, TimeProvider,
};
pub use scheduler::{EngineConfig, FlowScheduler, RunOutcome, DEFAULT_LOOP_FALLBACK};
pub use waiting::{ReadyNode, WaitingNode, WaitingTable};
