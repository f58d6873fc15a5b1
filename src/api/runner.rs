//! High-level flow runner and builder.
//!
//! [`FlowRunner`] (constructed via [`FlowRunnerBuilder`]) is the main entry point
//! for executing a parsed flow schema. It wires together the graph, the node
//! executor registry, config resolution, the ledger store and event delivery,
//! and either starts a fresh run or resumes a stopped one.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::core::abort::AbortSignal;
use crate::core::event_bus::{EventEmitter, EventSender};
use crate::core::ledger::{LedgerStore, MemoryLedgerStore};
use crate::core::resume::prepare_resume;
use crate::core::run_state::RunRuntimeState;
use crate::core::runtime_context::RuntimeContext;
use crate::core::scheduler::{validate_iteration_scopes, EngineConfig, FlowScheduler, RunOutcome};
use crate::dsl::{FlowSchema, HumanInput, NodeOutput};
use crate::error::FlowResult;
use crate::graph::{build_graph, FlowDefinition, FlowGraph};
use crate::nodes::{ConfigResolver, NodeExecutor, NodeExecutorRegistry, NodeInvoker, TemplateResolver};

/// Flow runner with builder-based configuration.
///
/// Use [`FlowRunner::builder(schema)`](Self::builder) to obtain a
/// [`FlowRunnerBuilder`].
pub struct FlowRunner;

impl FlowRunner {
    /// Create a new builder from a parsed flow schema.
    pub fn builder(schema: FlowSchema) -> FlowRunnerBuilder {
        FlowRunnerBuilder {
            schema,
            input: NodeOutput::default(),
            initial_state: Map::new(),
            registry: NodeExecutorRegistry::new(),
            resolver: None,
            ledger_store: Arc::new(MemoryLedgerStore::new()),
            config: EngineConfig::default(),
            events: EventEmitter::disabled(),
            abort_signal: AbortSignal::new(),
            context: RuntimeContext::default(),
            execution_id: None,
            resume: None,
        }
    }
}

/// Builder for configuring and launching a flow run.
pub struct FlowRunnerBuilder {
    schema: FlowSchema,
    input: NodeOutput,
    initial_state: Map<String, Value>,
    registry: NodeExecutorRegistry,
    resolver: Option<Arc<dyn ConfigResolver>>,
    ledger_store: Arc<dyn LedgerStore>,
    config: EngineConfig,
    events: EventEmitter,
    abort_signal: AbortSignal,
    context: RuntimeContext,
    execution_id: Option<String>,
    resume: Option<(String, HumanInput)>,
}

impl FlowRunnerBuilder {
    /// Starting input handed to the start node.
    pub fn input(mut self, input: NodeOutput) -> Self {
        self.input = input;
        self
    }

    /// Initial contents of the run's `state` bag.
    pub fn initial_state(mut self, state: Map<String, Value>) -> Self {
        self.initial_state = state;
        self
    }

    /// Replace the executor registry (built-in units are not kept).
    pub fn registry(mut self, registry: NodeExecutorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register one node unit on top of the current registry.
    pub fn executor(mut self, node_type: &str, executor: Box<dyn NodeExecutor>) -> Self {
        self.registry.register(node_type, executor);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn ConfigResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn ledger_store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.ledger_store = store;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Deliver progress events to `sender`.
    pub fn events(mut self, sender: EventSender) -> Self {
        self.events = EventEmitter::new(sender);
        self
    }

    pub fn abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = signal;
        self
    }

    pub fn runtime_context(mut self, context: RuntimeContext) -> Self {
        self.context = context;
        self
    }

    /// Execution id for a fresh run; generated when not set.
    pub fn execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    /// Resume the stopped execution `execution_id` with a human answer instead
    /// of starting a fresh run.
    pub fn resume(mut self, execution_id: impl Into<String>, answer: HumanInput) -> Self {
        self.resume = Some((execution_id.into(), answer));
        self
    }

    /// Build the graph and check it without running anything.
    pub fn validate(&self) -> FlowResult<()> {
        let definition = Arc::new(build_graph(&self.schema)?);
        validate_definition(&definition)
    }

    /// Run (or resume) the flow to completion, suspension or failure.
    pub async fn run(self) -> FlowResult<RunOutcome> {
        let definition = Arc::new(build_graph(&self.schema)?);
        validate_definition(&definition)?;

        let resolver = self
            .resolver
            .unwrap_or_else(|| {
                Arc::new(TemplateResolver::new(self.config.strict_template)) as Arc<dyn ConfigResolver>
            });
        let invoker = NodeInvoker::new(Arc::new(self.registry), resolver);

        match self.resume {
            Some((execution_id, answer)) => {
                let plan = prepare_resume(
                    self.ledger_store.as_ref(),
                    &definition,
                    &execution_id,
                    &answer,
                )
                .await?;
                FlowScheduler::new(execution_id, definition, invoker, self.ledger_store, self.config)
                    .with_events(self.events)
                    .with_abort_signal(self.abort_signal)
                    .with_runtime_context(self.context)
                    .resume(plan, answer)
                    .await
            }
            None => {
                let execution_id = self
                    .execution_id
                    .unwrap_or_else(|| self.context.id_generator.next_id());
                FlowScheduler::new(execution_id, definition, invoker, self.ledger_store, self.config)
                    .with_events(self.events)
                    .with_abort_signal(self.abort_signal)
                    .with_runtime_context(self.context)
                    .start(self.input, RunRuntimeState::with_state(self.initial_state))
                    .await
            }
        }
    }
}

fn validate_definition(definition: &Arc<FlowDefinition>) -> FlowResult<()> {
    FlowGraph::top_level(definition.clone()).start_node_id()?;
    validate_iteration_scopes(definition)
}
