//! Bookkeeping for nodes that have received some, but not all, of their inputs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::dsl::NodeOutput;
use crate::graph::{classify_parents, FlowGraph, ParentClassification};

/// A node that has been seen as a child but is not ready yet.
#[derive(Debug, Clone, Default)]
pub struct WaitingNode {
    pub required_parents: BTreeSet<String>,
    pub conditional_groups: BTreeMap<String, BTreeSet<String>>,
    pub received_inputs: BTreeMap<String, NodeOutput>,
}

impl WaitingNode {
    pub fn from_classification(classification: ParentClassification) -> Self {
        Self {
            required_parents: classification.required,
            conditional_groups: classification.conditional_groups,
            received_inputs: BTreeMap::new(),
        }
    }

    /// Every required parent has delivered and every conditional group has at
    /// least one member that delivered.
    pub fn is_ready(&self) -> bool {
        self.required_parents
            .iter()
            .all(|parent| self.received_inputs.contains_key(parent))
            && self.conditional_groups.values().all(|group| {
                group
                    .iter()
                    .any(|parent| self.received_inputs.contains_key(parent))
            })
    }
}

/// A node whose inputs are complete, ready to be enqueued.
#[derive(Debug, Clone)]
pub struct ReadyNode {
    pub node_id: String,
    pub received_inputs: BTreeMap<String, NodeOutput>,
}

/// Waiting nodes of one scheduling scope, keyed by node id.
#[derive(Debug, Default)]
pub struct WaitingTable {
    nodes: HashMap<String, WaitingNode>,
}

impl WaitingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `output` from `parent_id` for `child_id`, creating the waiting
    /// entry on first sight. When the child becomes ready its entry is removed
    /// and returned.
    pub fn deliver(
        &mut self,
        graph: &FlowGraph,
        child_id: &str,
        parent_id: &str,
        output: NodeOutput,
    ) -> Option<ReadyNode> {
        let waiting = self
            .nodes
            .entry(child_id.to_string())
            .or_insert_with(|| WaitingNode::from_classification(classify_parents(graph, child_id)));
        waiting
            .received_inputs
            .insert(parent_id.to_string(), output);

        if !waiting.is_ready() {
            return None;
        }

        self.nodes.remove(child_id).map(|waiting| ReadyNode {
            node_id: child_id.to_string(),
            received_inputs: waiting.received_inputs,
        })
    }

    pub fn get(&self, node_id: &str) -> Option<&WaitingNode> {
        self.nodes.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
