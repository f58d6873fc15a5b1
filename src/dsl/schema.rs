use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ================================
// Flow DSL Schema
// ================================

/// Current supported DSL version
pub const CURRENT_DSL_VERSION: &str = "0.1.0";

/// All supported DSL versions
pub const SUPPORTED_DSL_VERSIONS: &[&str] = &["0.1.0"];

fn default_version() -> String {
    CURRENT_DSL_VERSION.to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FlowSchema {
    /// DSL version string, e.g. "0.1.0"
    #[serde(default = "default_version")]
    pub version: String,
    pub nodes: Vec<NodeSchema>,
    #[serde(default)]
    pub edges: Vec<EdgeSchema>,
}

/// Node definition in the DSL.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NodeSchema {
    pub id: String,
    /// Enclosing iteration node, if this node belongs to an iteration block.
    #[serde(default, alias = "parentNode", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub data: NodeData,
}

/// Common node data. The `type` field selects the node unit; every other field
/// is the node's declarative configuration.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NodeData {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, alias = "label")]
    pub title: String,
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EdgeSchema {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, alias = "sourceHandle", skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, alias = "sourceOutputIndex", skip_serializing_if = "Option::is_none")]
    pub source_output_index: Option<usize>,
}

impl EdgeSchema {
    /// Output slot of the source node this edge leaves from.
    ///
    /// An explicit index wins; otherwise a handle such as `decision_1-output-2`
    /// (or a bare `"2"`) is parsed. Anything else is slot 0.
    pub fn output_index(&self) -> usize {
        if let Some(index) = self.source_output_index {
            return index;
        }
        self.source_handle
            .as_deref()
            .and_then(|handle| {
                let tail = handle.rsplit("-output-").next().unwrap_or(handle);
                tail.parse::<usize>().ok()
            })
            .unwrap_or(0)
    }
}

// ================================
// Node execution envelope
// ================================

/// Value passed between nodes: the output of one node is (part of) the input of the next.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct NodeOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn json(value: Value) -> Self {
        Self {
            json: Some(value),
            ..Default::default()
        }
    }

    /// Strings become text, null becomes empty, anything else is structured.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(text) => Self::text(text),
            Value::Null => Self::default(),
            other => Self::json(other),
        }
    }

    /// Text form: the text part, else the serialized structured part.
    pub fn to_text(&self) -> String {
        match (&self.text, &self.json) {
            (Some(text), _) => text.clone(),
            (None, Some(value)) => value.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Null/absent outputs are dropped when inputs are combined.
    pub fn is_empty(&self) -> bool {
        self.json.is_none() && self.text.is_none() && self.binary.is_none() && self.error.is_none()
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Per output slot fulfilment flag reported by decision nodes.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ConditionOutcome {
    #[serde(default, alias = "isFulfilled")]
    pub is_fulfilled: Option<bool>,
}

impl ConditionOutcome {
    pub fn fulfilled(value: bool) -> Self {
        Self {
            is_fulfilled: Some(value),
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.is_fulfilled.unwrap_or(false)
    }
}

/// Back-edge requested by a loop node.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct LoopTarget {
    #[serde(alias = "nodeId")]
    pub node_id: String,
    #[serde(default, alias = "maxLoopCount", skip_serializing_if = "Option::is_none")]
    pub max_loop_count: Option<u32>,
    #[serde(default, alias = "fallbackMessage", skip_serializing_if = "Option::is_none")]
    pub fallback_message: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Result envelope returned by every node unit. The scheduler only interprets
/// this envelope, never the unit's internals.
#[derive(Debug, Clone, Default)]
pub struct NodeRunResult {
    pub output: NodeOutput,
    /// Keys merged into the run state (last write wins).
    pub state: Option<Map<String, Value>>,
    /// Messages appended to the rolling chat history.
    pub chat_history: Vec<ChatMessage>,
    /// Keys merged into the form-value bag.
    pub form: Option<Map<String, Value>>,
    /// Fulfilment flags, one per output slot (decision nodes only).
    pub conditions: Option<Vec<ConditionOutcome>>,
    pub human_checkpoint_waiting: bool,
    pub loop_target: Option<LoopTarget>,
    pub iteration_items: Option<Vec<Value>>,
}

impl NodeRunResult {
    pub fn with_output(output: NodeOutput) -> Self {
        Self {
            output,
            ..Default::default()
        }
    }
}

// ================================
// Human checkpoint
// ================================

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HumanDecision {
    Proceed,
    Reject,
}

/// Answer supplied by a human when resuming a stopped run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct HumanInput {
    /// Node to resume at; when absent the most recent stopped node is used.
    #[serde(default, alias = "startNodeId", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub decision: HumanDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl HumanInput {
    pub fn proceed() -> Self {
        Self {
            node_id: None,
            decision: HumanDecision::Proceed,
            feedback: None,
        }
    }

    pub fn reject() -> Self {
        Self {
            node_id: None,
            decision: HumanDecision::Reject,
            feedback: None,
        }
    }

    pub fn at_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    /// Condition flags equivalent to this decision (slot 0 = proceed, slot 1 = reject).
    pub fn as_conditions(&self) -> Vec<ConditionOutcome> {
        let proceed = self.decision == HumanDecision::Proceed;
        vec![
            ConditionOutcome::fulfilled(proceed),
            ConditionOutcome::fulfilled(!proceed),
        ]
    }
}
