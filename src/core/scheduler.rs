//! The flow scheduler: ready queue, waiting-node table, loop bounds, iteration
//! sub-runs, suspension and ledger checkpoints.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::abort::AbortSignal;
use crate::core::combiner::combine_inputs;
use crate::core::event_bus::{EventEmitter, FlowEvent};
use crate::core::ledger::{
    aggregate_status, EntryStatus, ExecutionRecord, IterationTag, LedgerEntry, LedgerStore,
    ResumeAction, RunStatus,
};
use crate::core::resume::{ResumePlan, ResumeStep};
use crate::core::run_state::{IterationContext, RunContext, RunRuntimeState};
use crate::core::runtime_context::RuntimeContext;
use crate::core::waiting::WaitingTable;
use crate::dsl::{HumanDecision, HumanInput, NodeOutput};
use crate::error::{FlowError, NodeError};
use crate::graph::{FlowDefinition, FlowGraph, FlowNode, NodeKind};
use crate::nodes::{Invocation, NodeInvoker};

/// Output substituted into a loop node once its bound is reached and no
/// fallback message is configured.
pub const DEFAULT_LOOP_FALLBACK: &str = "Loop limit reached";

// ================================
// Engine configuration
// ================================

/// Configuration for the flow engine
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    /// Dequeue cap per scheduling scope (top level or one iteration element).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Loop bound used when a loop node does not configure one.
    #[serde(default = "default_max_loop_count")]
    pub default_max_loop_count: u32,
    #[serde(default)]
    pub strict_template: bool,
}

fn default_max_iterations() -> usize {
    1000
}

fn default_max_loop_count() -> u32 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_iterations: default_max_iterations(),
            default_max_loop_count: default_max_loop_count(),
            strict_template: false,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, FlowError> {
        toml::from_str(content).map_err(|e| FlowError::ConfigError(e.to_string()))
    }
}

// ================================
// Run outcome
// ================================

/// What a finished, stopped or completed attempt hands back to the caller.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub execution_id: String,
    pub status: RunStatus,
    /// Output of the last FINISHED top-level entry of this attempt.
    pub output: NodeOutput,
    pub runtime_state: RunRuntimeState,
    /// Full ledger, including entries of earlier attempts.
    pub ledger: Vec<LedgerEntry>,
    /// Present when the run stopped at a human checkpoint.
    pub action: Option<ResumeAction>,
}

// ================================
// Scheduler internals
// ================================

struct ReadyEntry {
    node_id: String,
    input: NodeOutput,
    predecessors: Vec<String>,
}

impl From<ResumeStep> for ReadyEntry {
    fn from(step: ResumeStep) -> Self {
        ReadyEntry {
            node_id: step.node_id,
            input: step.input,
            predecessors: step.previous_node_ids,
        }
    }
}

/// One scheduling scope: the top level, or one element of an iteration block.
struct ScopeFrame {
    graph: FlowGraph,
    runtime: RunRuntimeState,
    iteration: Option<IterationContext>,
    tag: Option<IterationTag>,
    /// Passes taken by each loop node of this scope, including earlier attempts.
    loop_counts: HashMap<String, u32>,
}

enum FrameOutcome {
    Completed {
        runtime: RunRuntimeState,
        output: Option<NodeOutput>,
    },
    Stopped {
        runtime: RunRuntimeState,
        action: Option<ResumeAction>,
    },
}

enum IterationOutcome {
    Completed(String),
    Stopped(Option<ResumeAction>),
}

/// 流程调度器 - 驱动一次运行（新运行或恢复）
pub struct FlowScheduler {
    execution_id: String,
    definition: Arc<FlowDefinition>,
    invoker: NodeInvoker,
    store: Arc<dyn LedgerStore>,
    config: EngineConfig,
    events: EventEmitter,
    abort: AbortSignal,
    context: RuntimeContext,
    /// Human answer and the node whose next invocation receives it.
    pending_answer: Option<(String, HumanInput)>,
    /// Restart points inside iteration elements, outermost first.
    resume_steps: VecDeque<ResumeStep>,
    prior_entries: Vec<LedgerEntry>,
    /// Entries appended during this attempt.
    attempt: Vec<LedgerEntry>,
}

impl FlowScheduler {
    pub fn new(
        execution_id: impl Into<String>,
        definition: Arc<FlowDefinition>,
        invoker: NodeInvoker,
        store: Arc<dyn LedgerStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            definition,
            invoker,
            store,
            config,
            events: EventEmitter::disabled(),
            abort: AbortSignal::new(),
            context: RuntimeContext::default(),
            pending_answer: None,
            resume_steps: VecDeque::new(),
            prior_entries: Vec::new(),
            attempt: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_runtime_context(mut self, context: RuntimeContext) -> Self {
        self.context = context;
        self
    }

    /// Start a fresh run from the top-level start node.
    pub async fn start(
        mut self,
        input: NodeOutput,
        runtime: RunRuntimeState,
    ) -> Result<RunOutcome, FlowError> {
        let top = FlowGraph::top_level(self.definition.clone());
        let start_node_id = top.start_node_id()?;
        validate_iteration_scopes(&self.definition)?;

        self.store
            .overwrite(&ExecutionRecord {
                execution_id: self.execution_id.clone(),
                status: RunStatus::InProgress,
                entries: Vec::new(),
                runtime_state: runtime.clone(),
                updated_at: self.context.time_provider.now_millis(),
            })
            .await?;

        tracing::info!(execution_id = %self.execution_id, start = %start_node_id, "run started");
        self.events.emit(FlowEvent::RunStarted {
            execution_id: self.execution_id.clone(),
            resumed: false,
            timestamp: self.context.time_provider.now(),
        });

        let seed = ReadyEntry {
            node_id: start_node_id,
            input,
            predecessors: Vec::new(),
        };
        self.run_top(top, seed, runtime).await
    }

    /// Continue a stopped run according to `plan`, delivering `answer` once.
    pub async fn resume(mut self, plan: ResumePlan, answer: HumanInput) -> Result<RunOutcome, FlowError> {
        let top = FlowGraph::top_level(self.definition.clone());
        validate_iteration_scopes(&self.definition)?;

        let mut steps: VecDeque<ResumeStep> = plan.steps.into();
        let first = steps
            .pop_front()
            .ok_or_else(|| FlowError::InternalError("empty resume plan".to_string()))?;
        top.node(&first.node_id)?;

        self.pending_answer = Some((plan.answer_node_id.clone(), answer));
        self.resume_steps = steps;
        self.prior_entries = plan.prior_entries;

        if plan.discard_trailing_error
            && self.store.discard_trailing_error(&self.execution_id).await?
        {
            tracing::info!(
                execution_id = %self.execution_id,
                "discarded trailing error entry before resume"
            );
        }

        let mut record = self
            .store
            .load(&self.execution_id)
            .await?
            .ok_or_else(|| FlowError::ExecutionNotFound(self.execution_id.clone()))?;
        record.status = RunStatus::InProgress;
        record.updated_at = self.context.time_provider.now_millis();
        self.store.overwrite(&record).await?;

        tracing::info!(
            execution_id = %self.execution_id,
            start = %first.node_id,
            answer_node = %plan.answer_node_id,
            "run resumed"
        );
        self.events.emit(FlowEvent::RunStarted {
            execution_id: self.execution_id.clone(),
            resumed: true,
            timestamp: self.context.time_provider.now(),
        });

        self.run_top(top, first.into(), plan.runtime_state).await
    }

    async fn run_top(
        mut self,
        graph: FlowGraph,
        seed: ReadyEntry,
        runtime: RunRuntimeState,
    ) -> Result<RunOutcome, FlowError> {
        let frame = ScopeFrame {
            graph,
            runtime,
            iteration: None,
            tag: None,
            loop_counts: self.recorded_loop_passes(None),
        };

        match self.run_frame(frame, seed).await {
            Ok(FrameOutcome::Completed { runtime, .. }) => {
                let status = aggregate_status(&self.attempt);
                self.finalize(status, Some(runtime), None).await
            }
            Ok(FrameOutcome::Stopped { runtime, action }) => {
                let status = aggregate_status(&self.attempt);
                self.finalize(status, Some(runtime), action).await
            }
            Err(err) => {
                let status = match err {
                    FlowError::Cancelled { .. } => RunStatus::Terminated,
                    _ => RunStatus::Error,
                };
                if let Err(persist_err) = self.finalize(status, None, None).await {
                    tracing::error!(
                        execution_id = %self.execution_id,
                        error = %persist_err,
                        "failed to persist run status"
                    );
                }
                Err(err)
            }
        }
    }

    async fn finalize(
        &mut self,
        status: RunStatus,
        runtime: Option<RunRuntimeState>,
        action: Option<ResumeAction>,
    ) -> Result<RunOutcome, FlowError> {
        let mut record = match self.store.load(&self.execution_id).await? {
            Some(record) => record,
            None => ExecutionRecord {
                execution_id: self.execution_id.clone(),
                status,
                entries: self
                    .prior_entries
                    .iter()
                    .chain(self.attempt.iter())
                    .cloned()
                    .collect(),
                runtime_state: RunRuntimeState::default(),
                updated_at: 0,
            },
        };
        record.status = status;
        if let Some(runtime) = runtime {
            record.runtime_state = runtime;
        }
        record.updated_at = self.context.time_provider.now_millis();
        self.store.overwrite(&record).await?;

        tracing::info!(execution_id = %self.execution_id, status = ?status, "run finished");
        self.events.emit(FlowEvent::RunStatusChanged {
            execution_id: self.execution_id.clone(),
            status,
            timestamp: self.context.time_provider.now(),
        });

        let output = self
            .attempt
            .iter()
            .rev()
            .find(|e| e.is_top_level() && e.status == EntryStatus::Finished)
            .map(|e| e.output.clone())
            .unwrap_or_default();

        Ok(RunOutcome {
            execution_id: self.execution_id.clone(),
            status,
            output,
            runtime_state: record.runtime_state,
            ledger: record.entries,
            action,
        })
    }

    /// Drain the ready queue of one scope.
    fn run_frame(
        &mut self,
        frame: ScopeFrame,
        seed: ReadyEntry,
    ) -> BoxFuture<'_, Result<FrameOutcome, FlowError>> {
        Box::pin(async move {
            let mut frame = frame;
            let mut queue = VecDeque::from([seed]);
            let mut waiting = WaitingTable::new();
            let mut iterations = 0usize;
            let mut last_output = None;

            while let Some(ready) = queue.pop_front() {
                iterations += 1;
                if iterations > self.config.max_iterations {
                    tracing::error!(
                        execution_id = %self.execution_id,
                        max = self.config.max_iterations,
                        "iteration cap exceeded"
                    );
                    return Err(FlowError::MaxIterationsExceeded(self.config.max_iterations));
                }

                let node = frame.graph.node(&ready.node_id)?.clone();

                if self.abort.is_aborted() {
                    let reason = self
                        .abort
                        .reason()
                        .unwrap_or_else(|| "run aborted".to_string());
                    let err = NodeError::Cancelled(reason);
                    return Err(self.handle_node_failure(&node, &ready, &frame, err).await);
                }

                let context = RunContext {
                    execution_id: self.execution_id.clone(),
                    node_id: node.id.clone(),
                    node_label: node.label.clone(),
                    runtime: frame.runtime.clone(),
                    human_input: self.take_answer(&node.id),
                    iteration: frame.iteration.clone(),
                    abort: self.abort.clone(),
                };

                tracing::debug!(
                    execution_id = %self.execution_id,
                    node_id = %node.id,
                    node_type = %node.node_type,
                    "dispatching node"
                );
                self.events.emit(FlowEvent::NodeStarted {
                    execution_id: self.execution_id.clone(),
                    node_id: node.id.clone(),
                    node_label: node.label.clone(),
                    iteration: frame.tag.clone(),
                    timestamp: self.context.time_provider.now(),
                });

                let Invocation {
                    mut result,
                    ignored,
                    stopped,
                } = match self
                    .invoker
                    .invoke(&frame.graph, &node, &ready.input, &context)
                    .await
                {
                    Ok(invocation) => invocation,
                    Err(err) => {
                        return Err(self.handle_node_failure(&node, &ready, &frame, err).await)
                    }
                };
                frame.runtime.apply(&result);

                if stopped {
                    let action = ResumeAction {
                        id: self.context.id_generator.next_id(),
                        node_id: node.id.clone(),
                        node_label: node.label.clone(),
                        prompt: result.output.text.clone(),
                        options: vec![HumanDecision::Proceed, HumanDecision::Reject],
                    };
                    self.record_stop(&node, &ready, &frame, result.output, Some(action.clone()))
                        .await?;
                    return Ok(FrameOutcome::Stopped {
                        runtime: frame.runtime,
                        action: Some(action),
                    });
                }

                if let Some(items) = result.iteration_items.take() {
                    match self
                        .run_iteration(&node, items, &mut frame.runtime)
                        .await?
                    {
                        IterationOutcome::Completed(text) => result.output.text = Some(text),
                        IterationOutcome::Stopped(action) => {
                            self.record_stop(&node, &ready, &frame, result.output, action.clone())
                                .await?;
                            return Ok(FrameOutcome::Stopped {
                                runtime: frame.runtime,
                                action,
                            });
                        }
                    }
                }

                let mut loop_back = None;
                if node.kind == NodeKind::Loop {
                    if let Some(target) = result.loop_target.take() {
                        let count = frame.loop_counts.entry(node.id.clone()).or_insert(0);
                        *count += 1;
                        let max = target
                            .max_loop_count
                            .unwrap_or(self.config.default_max_loop_count);
                        if *count < max {
                            loop_back = Some(target.node_id);
                        } else {
                            tracing::warn!(
                                execution_id = %self.execution_id,
                                node_id = %node.id,
                                loop_count = *count,
                                "loop bound reached; substituting fallback output"
                            );
                            result.output.text = Some(
                                target
                                    .fallback_message
                                    .unwrap_or_else(|| DEFAULT_LOOP_FALLBACK.to_string()),
                            );
                            self.events.emit(FlowEvent::LoopFallback {
                                execution_id: self.execution_id.clone(),
                                node_id: node.id.clone(),
                                loop_count: *count,
                            });
                        }
                    }
                }

                let entry = self.entry(
                    &node,
                    &ready,
                    &frame,
                    result.output.clone(),
                    EntryStatus::Finished,
                );
                self.append(entry).await?;
                self.events.emit(FlowEvent::NodeFinished {
                    execution_id: self.execution_id.clone(),
                    node_id: node.id.clone(),
                    output: result.output.clone(),
                    timestamp: self.context.time_provider.now(),
                });

                if let Some(target) = loop_back {
                    // a looped-back checkpoint must ask again
                    self.pending_answer = None;
                    queue.push_back(ReadyEntry {
                        node_id: target,
                        input: result.output.clone(),
                        predecessors: vec![node.id.clone()],
                    });
                    last_output = Some(result.output);
                    continue;
                }

                if !ignored.is_empty() {
                    tracing::debug!(node_id = %node.id, ignored = ?ignored, "branches ignored");
                    self.events.emit(FlowEvent::BranchesIgnored {
                        execution_id: self.execution_id.clone(),
                        node_id: node.id.clone(),
                        ignored: ignored.iter().cloned().collect(),
                    });
                }

                for child in frame.graph.children(&node.id) {
                    if ignored.contains(child) {
                        continue;
                    }
                    if let Some(ready_child) =
                        waiting.deliver(&frame.graph, child, &node.id, result.output.clone())
                    {
                        let input = combine_inputs(&ready_child.received_inputs);
                        queue.push_back(ReadyEntry {
                            node_id: ready_child.node_id,
                            input,
                            predecessors: ready_child.received_inputs.into_keys().collect(),
                        });
                    }
                }
                last_output = Some(result.output);
            }

            Ok(FrameOutcome::Completed {
                runtime: frame.runtime,
                output: last_output,
            })
        })
    }

    /// Run one nested scope per item, sequentially. Element failures become
    /// that element's text; cancellation and ledger failures propagate.
    async fn run_iteration(
        &mut self,
        node: &FlowNode,
        items: Vec<Value>,
        parent_runtime: &mut RunRuntimeState,
    ) -> Result<IterationOutcome, FlowError> {
        let body = FlowGraph::scoped(self.definition.clone(), Some(&node.id));
        let body_start = body.start_node_id()?;
        let total = items.len();

        let mut resume_step = self.take_resume_step(&node.id);
        let start_index = resume_step
            .as_ref()
            .and_then(|step| step.iteration.as_ref())
            .map_or(0, |tag| tag.index)
            .min(total);

        let mut texts: Vec<String> = (0..start_index)
            .map(|index| self.recorded_element_text(&node.id, index))
            .collect();

        for (index, value) in items.into_iter().enumerate().skip(start_index) {
            let tag = IterationTag {
                iteration_node_id: node.id.clone(),
                index,
            };
            let (seed, loop_counts) = match resume_step.take() {
                Some(step) => (ReadyEntry::from(step), self.recorded_loop_passes(Some(&tag))),
                None => (
                    ReadyEntry {
                        node_id: body_start.clone(),
                        input: NodeOutput::from_value(value.clone()),
                        predecessors: vec![node.id.clone()],
                    },
                    HashMap::new(),
                ),
            };
            let frame = ScopeFrame {
                graph: body.clone(),
                runtime: parent_runtime.clone(),
                iteration: Some(IterationContext {
                    index,
                    value,
                    is_first: index == 0,
                    is_last: index + 1 == total,
                }),
                tag: Some(tag),
                loop_counts,
            };

            match self.run_frame(frame, seed).await {
                Ok(FrameOutcome::Completed { runtime, output }) => {
                    parent_runtime.merge_state_from(&runtime);
                    texts.push(output.map(|o| o.to_text()).unwrap_or_default());
                    self.events.emit(FlowEvent::IterationElementFinished {
                        execution_id: self.execution_id.clone(),
                        node_id: node.id.clone(),
                        index,
                        error: None,
                    });
                }
                Ok(FrameOutcome::Stopped { runtime, action }) => {
                    parent_runtime.merge_state_from(&runtime);
                    return Ok(IterationOutcome::Stopped(action));
                }
                Err(err @ (FlowError::Cancelled { .. } | FlowError::Ledger(_))) => return Err(err),
                Err(err) => {
                    let message = match &err {
                        FlowError::NodeExecutionError { error, .. } => error.clone(),
                        other => other.to_string(),
                    };
                    tracing::warn!(
                        execution_id = %self.execution_id,
                        node_id = %node.id,
                        index,
                        error = %message,
                        "iteration element failed"
                    );
                    self.events.emit(FlowEvent::IterationElementFinished {
                        execution_id: self.execution_id.clone(),
                        node_id: node.id.clone(),
                        index,
                        error: Some(message.clone()),
                    });
                    texts.push(element_error_text(index, &message));
                }
            }
        }

        Ok(IterationOutcome::Completed(texts.join("\n")))
    }

    /// Record a failed invocation (ERROR, or TERMINATED for cancellation) and
    /// turn it into the run-level error.
    async fn handle_node_failure(
        &mut self,
        node: &FlowNode,
        ready: &ReadyEntry,
        frame: &ScopeFrame,
        error: NodeError,
    ) -> FlowError {
        let status = if error.is_cancellation() {
            EntryStatus::Terminated
        } else {
            EntryStatus::Error
        };
        let message = error.to_string();
        tracing::error!(
            execution_id = %self.execution_id,
            node_id = %node.id,
            status = ?status,
            error = %message,
            "node failed"
        );

        let mut entry = self.entry(
            node,
            ready,
            frame,
            NodeOutput {
                error: Some(message.clone()),
                ..Default::default()
            },
            status,
        );
        entry.error = Some(message.clone());
        if let Err(err) = self.append(entry).await {
            return err;
        }

        self.events.emit(FlowEvent::NodeFailed {
            execution_id: self.execution_id.clone(),
            node_id: node.id.clone(),
            status,
            error: message.clone(),
        });

        match status {
            EntryStatus::Terminated => FlowError::Cancelled {
                node_id: node.id.clone(),
            },
            _ => FlowError::NodeExecutionError {
                node_id: node.id.clone(),
                error: message,
            },
        }
    }

    async fn record_stop(
        &mut self,
        node: &FlowNode,
        ready: &ReadyEntry,
        frame: &ScopeFrame,
        output: NodeOutput,
        action: Option<ResumeAction>,
    ) -> Result<(), FlowError> {
        let mut entry = self.entry(node, ready, frame, output, EntryStatus::Stopped);
        entry.action = action.clone();
        self.append(entry).await?;

        tracing::info!(
            execution_id = %self.execution_id,
            node_id = %node.id,
            "node waiting for human input"
        );
        if let Some(action) = action {
            self.events.emit(FlowEvent::NodeStopped {
                execution_id: self.execution_id.clone(),
                node_id: node.id.clone(),
                action,
            });
        }
        Ok(())
    }

    fn entry(
        &self,
        node: &FlowNode,
        ready: &ReadyEntry,
        frame: &ScopeFrame,
        output: NodeOutput,
        status: EntryStatus,
    ) -> LedgerEntry {
        LedgerEntry {
            node_id: node.id.clone(),
            node_label: node.label.clone(),
            node_type: node.node_type.clone(),
            input: ready.input.clone(),
            output,
            error: None,
            previous_node_ids: ready.predecessors.clone(),
            status,
            iteration: frame.tag.clone(),
            action: None,
            recorded_at: self.context.time_provider.now_millis(),
        }
    }

    /// Durably append before any further scheduling decision.
    async fn append(&mut self, entry: LedgerEntry) -> Result<(), FlowError> {
        self.store.append(&self.execution_id, &entry).await?;
        self.attempt.push(entry);
        Ok(())
    }

    fn take_answer(&mut self, node_id: &str) -> Option<HumanInput> {
        match &self.pending_answer {
            Some((target, _)) if target == node_id => {
                self.pending_answer.take().map(|(_, answer)| answer)
            }
            _ => None,
        }
    }

    fn take_resume_step(&mut self, iteration_node_id: &str) -> Option<ResumeStep> {
        let matches = self.resume_steps.front().is_some_and(|step| {
            step.iteration
                .as_ref()
                .is_some_and(|tag| tag.iteration_node_id == iteration_node_id)
        });
        if matches {
            self.resume_steps.pop_front()
        } else {
            None
        }
    }

    /// Loop passes recorded by earlier attempts in the scope named by `tag`.
    /// For an element scope only entries after the iteration node's last
    /// completed run count, so an earlier run of the same block is ignored.
    fn recorded_loop_passes(&self, tag: Option<&IterationTag>) -> HashMap<String, u32> {
        let since = tag
            .and_then(|tag| {
                self.prior_entries.iter().rposition(|e| {
                    e.node_id == tag.iteration_node_id && e.status == EntryStatus::Finished
                })
            })
            .map_or(0, |pos| pos + 1);

        let mut counts = HashMap::new();
        for entry in &self.prior_entries[since..] {
            let is_loop = self
                .definition
                .node(&entry.node_id)
                .is_some_and(|n| n.kind == NodeKind::Loop);
            if is_loop && entry.status == EntryStatus::Finished && entry.iteration.as_ref() == tag {
                *counts.entry(entry.node_id.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Text of an element completed in an earlier attempt.
    fn recorded_element_text(&self, iteration_node_id: &str, index: usize) -> String {
        self.prior_entries
            .iter()
            .rev()
            .filter(|e| {
                e.iteration.as_ref().is_some_and(|tag| {
                    tag.iteration_node_id == iteration_node_id && tag.index == index
                })
            })
            .find_map(|e| match e.status {
                EntryStatus::Finished => Some(e.output.to_text()),
                EntryStatus::Error => Some(element_error_text(
                    index,
                    e.error.as_deref().unwrap_or_default(),
                )),
                _ => None,
            })
            .unwrap_or_default()
    }
}

fn element_error_text(index: usize, message: &str) -> String {
    format!("Error in iteration {}: {}", index, message)
}

/// Every iteration block must have exactly one entry node.
pub fn validate_iteration_scopes(definition: &Arc<FlowDefinition>) -> Result<(), FlowError> {
    for node in definition.nodes() {
        if node.kind != NodeKind::Iteration {
            continue;
        }
        FlowGraph::scoped(definition.clone(), Some(&node.id))
            .start_node_id()
            .map_err(|e| {
                FlowError::GraphBuildError(format!("iteration block {}: {}", node.id, e))
            })?;
    }
    Ok(())
}
