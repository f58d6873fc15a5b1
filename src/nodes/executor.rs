use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::core::run_state::RunContext;
use crate::dsl::{NodeOutput, NodeRunResult};
use crate::error::NodeError;

/// Node unit contract. Each node type implements this; the scheduler only
/// interprets the returned [`NodeRunResult`] envelope.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Execute the node with its resolved configuration and combined input.
    async fn execute(
        &self,
        config: &Value,
        input: &NodeOutput,
        context: &RunContext,
    ) -> Result<NodeRunResult, NodeError>;
}

/// Registry of node executors by node type string
pub struct NodeExecutorRegistry {
    executors: HashMap<String, Box<dyn NodeExecutor>>,
}

impl NodeExecutorRegistry {
    /// Registry with the built-in control units.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("start", Box::new(super::builtin::PassThroughExecutor));
        registry.register("end", Box::new(super::builtin::PassThroughExecutor));
        registry.register("terminal", Box::new(super::builtin::PassThroughExecutor));
        registry.register("decision", Box::new(super::builtin::DecisionExecutor));
        registry.register("loop", Box::new(super::builtin::LoopExecutor));
        registry.register(
            "human-checkpoint",
            Box::new(super::builtin::HumanCheckpointExecutor),
        );
        registry.register("iteration", Box::new(super::builtin::IterationExecutor));
        registry
    }

    pub fn empty() -> Self {
        NodeExecutorRegistry {
            executors: HashMap::new(),
        }
    }

    pub fn register(&mut self, node_type: &str, executor: Box<dyn NodeExecutor>) {
        self.executors.insert(node_type.to_string(), executor);
    }

    pub fn get(&self, node_type: &str) -> Option<&dyn NodeExecutor> {
        self.executors.get(node_type).map(|e| e.as_ref())
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.executors.contains_key(node_type)
    }
}

impl Default for NodeExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
