use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::run_state::RunContext;
use crate::dsl::{ConditionOutcome, NodeOutput, NodeRunResult};
use crate::error::NodeError;
use crate::graph::{FlowGraph, FlowNode, NodeKind};

use super::executor::NodeExecutorRegistry;
use super::resolver::ConfigResolver;

/// Result of one node invocation, interpreted for scheduling.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub result: NodeRunResult,
    /// Children that must not be enqueued because their output slot was not chosen.
    pub ignored: BTreeSet<String>,
    /// The node is waiting for a human answer; the run suspends.
    pub stopped: bool,
}

/// 节点调用器 - 解析配置、调用 node unit 并解释结果信封
pub struct NodeInvoker {
    registry: Arc<NodeExecutorRegistry>,
    resolver: Arc<dyn ConfigResolver>,
}

impl NodeInvoker {
    pub fn new(registry: Arc<NodeExecutorRegistry>, resolver: Arc<dyn ConfigResolver>) -> Self {
        Self { registry, resolver }
    }

    pub async fn invoke(
        &self,
        graph: &FlowGraph,
        node: &FlowNode,
        input: &NodeOutput,
        context: &RunContext,
    ) -> Result<Invocation, NodeError> {
        let executor = self
            .registry
            .get(&node.node_type)
            .ok_or_else(|| NodeError::ExecutorNotFound(node.node_type.clone()))?;
        let config = self.resolver.resolve(&node.config, context)?;

        let mut result = executor.execute(&config, input, context).await?;

        // a unit may keep waiting even after it received an answer
        let stopped = result.human_checkpoint_waiting
            || (node.kind == NodeKind::HumanCheckpoint && context.human_input.is_none());
        if stopped {
            return Ok(Invocation {
                result,
                ignored: BTreeSet::new(),
                stopped,
            });
        }

        if node.kind == NodeKind::HumanCheckpoint && result.conditions.is_none() {
            result.conditions = context.human_input.as_ref().map(|h| h.as_conditions());
        }

        let ignored = if node.kind.is_decision() {
            result
                .conditions
                .as_deref()
                .map(|conditions| ignored_targets(graph, &node.id, conditions))
                .unwrap_or_default()
        } else {
            BTreeSet::new()
        };

        Ok(Invocation {
            result,
            ignored,
            stopped,
        })
    }
}

/// Targets reached only through output slots whose condition is unfulfilled or
/// absent. A target also reached through a fulfilled slot stays live.
pub fn ignored_targets(
    graph: &FlowGraph,
    node_id: &str,
    conditions: &[ConditionOutcome],
) -> BTreeSet<String> {
    let mut live = BTreeSet::new();
    let mut dead = BTreeSet::new();
    for edge in graph.outgoing_edges(node_id) {
        let fulfilled = conditions
            .get(edge.source_output_index)
            .is_some_and(ConditionOutcome::is_fulfilled);
        if fulfilled {
            live.insert(edge.target.clone());
        } else {
            dead.insert(edge.target.clone());
        }
    }
    dead.difference(&live).cloned().collect()
}
