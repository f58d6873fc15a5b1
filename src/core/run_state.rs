//! Caller-visible run state and the per-invocation context handed to node units.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::abort::AbortSignal;
use crate::dsl::{ChatMessage, HumanInput, NodeRunResult};

/// State carried through a run, across suspend/resume and back out of
/// iteration sub-runs.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RunRuntimeState {
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default)]
    pub form: Map<String, Value>,
}

impl RunRuntimeState {
    pub fn with_state(state: Map<String, Value>) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    /// Merge the state, chat-history and form deltas of a node result.
    pub fn apply(&mut self, result: &NodeRunResult) {
        if let Some(delta) = &result.state {
            for (key, value) in delta {
                self.state.insert(key.clone(), value.clone());
            }
        }
        self.chat_history
            .extend(result.chat_history.iter().cloned());
        if let Some(delta) = &result.form {
            for (key, value) in delta {
                self.form.insert(key.clone(), value.clone());
            }
        }
    }

    /// Last-write-wins merge of another run's `state` bag into this one.
    pub fn merge_state_from(&mut self, other: &RunRuntimeState) {
        for (key, value) in &other.state {
            self.state.insert(key.clone(), value.clone());
        }
    }
}

/// Position of a nested sub-run within its iteration block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IterationContext {
    pub index: usize,
    pub value: Value,
    pub is_first: bool,
    pub is_last: bool,
}

/// Everything a node unit may read about the run it is invoked in.
#[derive(Clone)]
pub struct RunContext {
    pub execution_id: String,
    pub node_id: String,
    pub node_label: String,
    /// Snapshot of the runtime state at invocation time.
    pub runtime: RunRuntimeState,
    /// Human answer, present only on the one invocation it was meant for.
    pub human_input: Option<HumanInput>,
    pub iteration: Option<IterationContext>,
    pub abort: AbortSignal,
}
