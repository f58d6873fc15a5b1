//! Built-in control units: pass-through start/end, decision, loop,
//! human checkpoint and iteration.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::run_state::RunContext;
use crate::dsl::{ChatMessage, ConditionOutcome, LoopTarget, NodeOutput, NodeRunResult};
use crate::error::NodeError;
use crate::nodes::executor::NodeExecutor;

fn parse_config<T: for<'de> Deserialize<'de>>(config: &Value) -> Result<T, NodeError> {
    serde_json::from_value(config.clone()).map_err(|e| NodeError::ConfigError(e.to_string()))
}

// ================================
// Start / End
// ================================

/// Forwards its input, or a configured `output` value when present.
pub struct PassThroughExecutor;

#[async_trait]
impl NodeExecutor for PassThroughExecutor {
    async fn execute(
        &self,
        config: &Value,
        input: &NodeOutput,
        _context: &RunContext,
    ) -> Result<NodeRunResult, NodeError> {
        let output = match config.get("output") {
            Some(value) => NodeOutput::from_value(value.clone()),
            None => input.clone(),
        };
        Ok(NodeRunResult::with_output(output))
    }
}

// ================================
// Decision
// ================================

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    #[serde(alias = "=", alias = "is")]
    Equal,
    #[serde(alias = "≠", alias = "is_not")]
    NotEqual,
    Contains,
    NotContains,
    #[serde(alias = ">")]
    GreaterThan,
    #[serde(alias = "<")]
    LessThan,
    #[serde(alias = "≥", alias = "greater_than_or_equal")]
    GreaterOrEqual,
    #[serde(alias = "≤", alias = "less_than_or_equal")]
    LessOrEqual,
    Empty,
    NotEmpty,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DecisionCondition {
    /// Left operand; the node's input text when absent.
    #[serde(default)]
    pub left: Option<Value>,
    pub operator: ComparisonOperator,
    #[serde(default)]
    pub right: Value,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct DecisionConfig {
    #[serde(default)]
    conditions: Vec<DecisionCondition>,
}

/// Picks the first matching condition's slot; the slot after the last
/// condition is the else branch.
pub struct DecisionExecutor;

#[async_trait]
impl NodeExecutor for DecisionExecutor {
    async fn execute(
        &self,
        config: &Value,
        input: &NodeOutput,
        _context: &RunContext,
    ) -> Result<NodeRunResult, NodeError> {
        let config: DecisionConfig = parse_config(config)?;
        let fallback_left = input
            .text
            .clone()
            .map(Value::String)
            .or_else(|| input.json.clone())
            .unwrap_or(Value::Null);

        let mut selected = config.conditions.len();
        for (slot, condition) in config.conditions.iter().enumerate() {
            let left = condition.left.as_ref().unwrap_or(&fallback_left);
            if compare(condition.operator, left, &condition.right) {
                selected = slot;
                break;
            }
        }

        let conditions = (0..=config.conditions.len())
            .map(|slot| ConditionOutcome::fulfilled(slot == selected))
            .collect();

        Ok(NodeRunResult {
            output: input.clone(),
            conditions: Some(conditions),
            ..Default::default()
        })
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

pub fn compare(operator: ComparisonOperator, left: &Value, right: &Value) -> bool {
    use ComparisonOperator::*;

    let numbers = || as_number(left).zip(as_number(right));
    match operator {
        Equal => left == right || numbers().is_some_and(|(a, b)| a == b),
        NotEqual => !compare(Equal, left, right),
        Contains => match (left, right) {
            (Value::String(s), Value::String(t)) => s.contains(t.as_str()),
            (Value::Array(items), target) => items.contains(target),
            _ => false,
        },
        NotContains => !compare(Contains, left, right),
        GreaterThan => numbers().is_some_and(|(a, b)| a > b),
        LessThan => numbers().is_some_and(|(a, b)| a < b),
        GreaterOrEqual => numbers().is_some_and(|(a, b)| a >= b),
        LessOrEqual => numbers().is_some_and(|(a, b)| a <= b),
        Empty => is_empty_value(left),
        NotEmpty => !is_empty_value(left),
    }
}

// ================================
// Loop
// ================================

#[derive(Deserialize, Debug, Clone)]
struct LoopConfig {
    #[serde(alias = "loopBackTo")]
    loop_back_to: String,
    #[serde(default, alias = "maxLoopCount")]
    max_loop_count: Option<u32>,
    #[serde(default, alias = "fallbackMessage")]
    fallback_message: Option<String>,
}

/// Requests a back-edge to `loop_back_to` on every invocation; the scheduler
/// enforces the bound.
pub struct LoopExecutor;

#[async_trait]
impl NodeExecutor for LoopExecutor {
    async fn execute(
        &self,
        config: &Value,
        input: &NodeOutput,
        _context: &RunContext,
    ) -> Result<NodeRunResult, NodeError> {
        let config: LoopConfig = parse_config(config)?;
        Ok(NodeRunResult {
            output: input.clone(),
            loop_target: Some(LoopTarget {
                node_id: config.loop_back_to,
                max_loop_count: config.max_loop_count,
                fallback_message: config.fallback_message,
            }),
            ..Default::default()
        })
    }
}

// ================================
// Human checkpoint
// ================================

/// Waits for a human answer; once answered, forwards its input and records the
/// decision. Branch conditions are derived from the answer by the scheduler.
pub struct HumanCheckpointExecutor;

#[async_trait]
impl NodeExecutor for HumanCheckpointExecutor {
    async fn execute(
        &self,
        config: &Value,
        input: &NodeOutput,
        context: &RunContext,
    ) -> Result<NodeRunResult, NodeError> {
        let Some(answer) = &context.human_input else {
            let prompt = config
                .get("prompt")
                .and_then(Value::as_str)
                .unwrap_or("Awaiting human input");
            return Ok(NodeRunResult {
                output: NodeOutput::text(prompt),
                human_checkpoint_waiting: true,
                ..Default::default()
            });
        };

        let mut output = input.clone();
        output.json = Some(json!({
            "decision": answer.decision,
            "feedback": answer.feedback,
        }));

        let chat_history = answer
            .feedback
            .iter()
            .map(|feedback| ChatMessage::new("user", feedback.clone()))
            .collect();

        Ok(NodeRunResult {
            output,
            chat_history,
            ..Default::default()
        })
    }
}

// ================================
// Iteration
// ================================

/// Declares the items of an iteration block: the `items` config value, else
/// the input's structured array, else one item per input text line.
pub struct IterationExecutor;

#[async_trait]
impl NodeExecutor for IterationExecutor {
    async fn execute(
        &self,
        config: &Value,
        input: &NodeOutput,
        _context: &RunContext,
    ) -> Result<NodeRunResult, NodeError> {
        let items = match (config.get("items"), &input.json, &input.text) {
            (Some(Value::Array(items)), _, _) => items.clone(),
            (Some(other), _, _) => {
                return Err(NodeError::TypeError(format!(
                    "iteration items must be an array, got {}",
                    other
                )))
            }
            (None, Some(Value::Array(items)), _) => items.clone(),
            (None, _, Some(text)) => text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| Value::String(line.to_string()))
                .collect(),
            _ => {
                return Err(NodeError::ConfigError(
                    "iteration node has no items".to_string(),
                ))
            }
        };

        Ok(NodeRunResult {
            output: input.clone(),
            iteration_items: Some(items),
            ..Default::default()
        })
    }
}
