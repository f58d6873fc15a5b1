//! Dependency analysis for join nodes.
//!
//! Every incoming edge of a node is either *required* (its source must deliver
//! before the node may run) or *conditional*: the source sits behind a decision
//! node, so only one member of its group will ever deliver. Grouping alternatives
//! by their nearest decision ancestor lets a join behind an if/else wait for
//! exactly one branch instead of deadlocking on the branch that was never taken.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use super::builder::FlowGraph;

/// How the parents of a node gate its readiness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentClassification {
    pub required: BTreeSet<String>,
    /// Decision ancestor id → alternative parent ids.
    pub conditional_groups: BTreeMap<String, BTreeSet<String>>,
}

/// Breadth-first walk up the reverse map, starting at `from` itself, returning the
/// nearest decision-type node. Stops on repeated visits.
pub fn nearest_decision_ancestor(graph: &FlowGraph, from: &str) -> Option<String> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([from]);

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        if let Ok(node) = graph.node(current) {
            if node.kind.is_decision() {
                return Some(node.id.clone());
            }
        }
        for parent in graph.parents(current) {
            if !visited.contains(parent.as_str()) {
                queue.push_back(parent);
            }
        }
    }

    None
}

/// Classify every incoming edge of `node_id`.
pub fn classify_parents(graph: &FlowGraph, node_id: &str) -> ParentClassification {
    let mut classification = ParentClassification::default();

    for parent in graph.parents(node_id) {
        match nearest_decision_ancestor(graph, parent) {
            Some(ancestor) => {
                classification
                    .conditional_groups
                    .entry(ancestor)
                    .or_default()
                    .insert(parent.clone());
            }
            None => {
                classification.required.insert(parent.clone());
            }
        }
    }

    classification
}
