#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use agentflow::dsl::{parse_dsl, DslFormat};
use agentflow::{
    FakeIdGenerator, FakeTimeProvider, FlowRunner, FlowRunnerBuilder, FlowSchema, NodeError,
    NodeExecutor, NodeOutput, NodeRunResult, RunContext, RuntimeContext,
};

/// Shared call log: one `node_id` (or `node_id#index` inside iterations) per invocation.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Scripted node unit driven by its node config:
///
/// - output text is `"{input}>{node_id}"`
/// - `state`: object merged into the run state
/// - `fail`: always fail; `fail_on_index`: fail inside that iteration element
/// - `abort`: trip the run's abort signal after producing output
/// - `wait_for`: keep asking for human input until the answer's feedback matches
pub struct Scripted {
    pub calls: CallLog,
}

#[async_trait]
impl NodeExecutor for Scripted {
    async fn execute(
        &self,
        config: &Value,
        input: &NodeOutput,
        context: &RunContext,
    ) -> Result<NodeRunResult, NodeError> {
        let label = match &context.iteration {
            Some(iteration) => format!("{}#{}", context.node_id, iteration.index),
            None => context.node_id.clone(),
        };
        self.calls.lock().push(label);

        let fail_here = config.get("fail").and_then(Value::as_bool).unwrap_or(false)
            || matches!(
                (config.get("fail_on_index").and_then(Value::as_u64), &context.iteration),
                (Some(index), Some(iteration)) if index as usize == iteration.index
            );
        if fail_here {
            return Err(NodeError::ExecutionError("boom".into()));
        }

        if config.get("abort").and_then(Value::as_bool).unwrap_or(false) {
            context.abort.abort("stop requested");
        }

        let mut result = NodeRunResult::with_output(NodeOutput::text(format!(
            "{}>{}",
            input.to_text(),
            context.node_id
        )));
        result.state = config.get("state").and_then(Value::as_object).cloned();
        if let Some(expected) = config.get("wait_for").and_then(Value::as_str) {
            let answered = context
                .human_input
                .as_ref()
                .and_then(|answer| answer.feedback.as_deref());
            result.human_checkpoint_waiting = answered != Some(expected);
        }
        Ok(result)
    }
}

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls_of(calls: &CallLog, node_id: &str) -> usize {
    calls
        .lock()
        .iter()
        .filter(|c| c.as_str() == node_id || c.starts_with(&format!("{}#", node_id)))
        .count()
}

pub fn yaml(content: &str) -> FlowSchema {
    parse_dsl(content, DslFormat::Yaml).unwrap()
}

/// Builder with the scripted unit registered as `task` and deterministic ids/timestamps.
pub fn runner(schema: FlowSchema, calls: &CallLog) -> FlowRunnerBuilder {
    FlowRunner::builder(schema)
        .executor(
            "task",
            Box::new(Scripted {
                calls: calls.clone(),
            }),
        )
        .runtime_context(
            RuntimeContext::default()
                .with_time_provider(Arc::new(FakeTimeProvider::new(1_700_000_000_000)))
                .with_id_generator(Arc::new(FakeIdGenerator::new("id"))),
        )
}
