use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::dsl::FlowSchema;
use crate::error::FlowError;

use super::types::*;

/// Forward (node → children) or reverse (node → parents) adjacency map.
pub type AdjacencyMap = HashMap<String, Vec<String>>;

/// 流程定义 - 从 DSL 解析后的不可变节点/边集合
#[derive(Debug)]
pub struct FlowDefinition {
    nodes: HashMap<String, FlowNode>,
    /// 节点声明顺序
    order: Vec<String>,
    edges: Vec<FlowEdge>,
}

impl FlowDefinition {
    pub fn node(&self, node_id: &str) -> Option<&FlowNode> {
        self.nodes.get(node_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.edges
    }

    /// Walk up the iteration scopes of `node_id` and return the node that lives
    /// at the top level (the node itself when it is not scoped).
    pub fn top_level_ancestor(&self, node_id: &str) -> Option<String> {
        let mut current = self.nodes.get(node_id)?;
        let mut seen = HashSet::new();
        while let Some(parent_id) = current.parent_id.as_deref() {
            if !seen.insert(parent_id.to_string()) {
                break;
            }
            current = self.nodes.get(parent_id)?;
        }
        Some(current.id.clone())
    }

    /// Whether `node_id` sits (directly or transitively) inside iteration block `scope_id`.
    pub fn is_within_scope(&self, node_id: &str, scope_id: &str) -> bool {
        let mut parent = self.nodes.get(node_id).and_then(|n| n.parent_id.as_deref());
        let mut hops = 0;
        while let Some(p) = parent {
            if p == scope_id {
                return true;
            }
            hops += 1;
            if hops > self.nodes.len() {
                break;
            }
            parent = self.nodes.get(p).and_then(|n| n.parent_id.as_deref());
        }
        false
    }
}

/// A scheduling view over one scope of a [`FlowDefinition`]: the top level when
/// `scope` is `None`, or the body of the iteration node named by `scope`.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    definition: Arc<FlowDefinition>,
    scope: Option<String>,
    node_ids: Vec<String>,
    forward: AdjacencyMap,
    reverse: AdjacencyMap,
}

impl FlowGraph {
    /// View of the top-level scope.
    pub fn top_level(definition: Arc<FlowDefinition>) -> Self {
        Self::scoped(definition, None)
    }

    /// View of the nodes whose parent iteration is `scope`.
    pub fn scoped(definition: Arc<FlowDefinition>, scope: Option<&str>) -> Self {
        let node_ids: Vec<String> = definition
            .nodes()
            .filter(|n| n.parent_id.as_deref() == scope)
            .map(|n| n.id.clone())
            .collect();
        let members: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
        let edges: Vec<&FlowEdge> = definition
            .edges()
            .iter()
            .filter(|e| members.contains(e.source.as_str()) && members.contains(e.target.as_str()))
            .collect();
        let (forward, reverse) = build_adjacency(&node_ids, edges.into_iter());

        FlowGraph {
            scope: scope.map(str::to_string),
            definition,
            node_ids,
            forward,
            reverse,
        }
    }

    pub fn definition(&self) -> &Arc<FlowDefinition> {
        &self.definition
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// 根据节点 ID 获取本作用域内的节点
    pub fn node(&self, node_id: &str) -> Result<&FlowNode, FlowError> {
        self.definition
            .node(node_id)
            .filter(|n| n.parent_id.as_deref() == self.scope.as_deref())
            .ok_or_else(|| FlowError::NodeNotFound(node_id.to_string()))
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.node(node_id).is_ok()
    }

    /// 获取节点的所有后继节点 ID
    pub fn children(&self, node_id: &str) -> &[String] {
        self.forward.get(node_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// 获取节点的所有前驱节点 ID
    pub fn parents(&self, node_id: &str) -> &[String] {
        self.reverse.get(node_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Outgoing edges of `node_id` inside this scope.
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.definition
            .edges()
            .iter()
            .filter(move |e| e.source == node_id && self.contains(&e.target))
    }

    pub fn forward(&self) -> &AdjacencyMap {
        &self.forward
    }

    pub fn reverse(&self) -> &AdjacencyMap {
        &self.reverse
    }

    /// The single node of this scope without incoming edges.
    pub fn start_node_id(&self) -> Result<String, FlowError> {
        let starts: Vec<String> = self
            .node_ids
            .iter()
            .filter(|id| self.parents(id).is_empty())
            .cloned()
            .collect();
        match starts.len() {
            0 => Err(FlowError::NoStartNode),
            1 => Ok(starts.into_iter().next().unwrap_or_default()),
            _ => Err(FlowError::MultipleStartNodes(starts)),
        }
    }
}

/// Build forward and reverse adjacency maps. Every node gets an entry in both maps,
/// children/parents keep edge declaration order and are de-duplicated.
pub fn build_adjacency<'a>(
    node_ids: &[String],
    edges: impl Iterator<Item = &'a FlowEdge>,
) -> (AdjacencyMap, AdjacencyMap) {
    let mut forward: AdjacencyMap = node_ids.iter().map(|id| (id.clone(), Vec::new())).collect();
    let mut reverse: AdjacencyMap = forward.clone();

    for edge in edges {
        let children = forward.entry(edge.source.clone()).or_default();
        if !children.contains(&edge.target) {
            children.push(edge.target.clone());
        }
        let parents = reverse.entry(edge.target.clone()).or_default();
        if !parents.contains(&edge.source) {
            parents.push(edge.source.clone());
        }
    }

    (forward, reverse)
}

/// 从 DSL schema 构建流程定义
pub fn build_graph(dsl: &FlowSchema) -> Result<FlowDefinition, FlowError> {
    let mut nodes: HashMap<String, FlowNode> = HashMap::with_capacity(dsl.nodes.len());
    let mut order = Vec::with_capacity(dsl.nodes.len());

    // 1. 添加所有节点
    for node_schema in &dsl.nodes {
        if nodes.contains_key(&node_schema.id) {
            return Err(FlowError::GraphBuildError(format!(
                "Duplicate node id: {}",
                node_schema.id
            )));
        }
        let node = FlowNode {
            id: node_schema.id.clone(),
            node_type: node_schema.data.node_type.clone(),
            kind: NodeKind::from_node_type(&node_schema.data.node_type),
            label: if node_schema.data.title.is_empty() {
                node_schema.id.clone()
            } else {
                node_schema.data.title.clone()
            },
            config: serde_json::Value::Object(node_schema.data.config.clone()),
            parent_id: node_schema.parent_id.clone(),
        };
        order.push(node.id.clone());
        nodes.insert(node.id.clone(), node);
    }

    // 2. 校验迭代作用域
    for node in nodes.values() {
        if let Some(parent_id) = node.parent_id.as_deref() {
            match nodes.get(parent_id) {
                Some(parent) if parent.kind == NodeKind::Iteration => {}
                Some(parent) => {
                    return Err(FlowError::GraphBuildError(format!(
                        "Node {} is scoped to {} which is not an iteration node ({})",
                        node.id, parent_id, parent.node_type
                    )))
                }
                None => {
                    return Err(FlowError::GraphBuildError(format!(
                        "Parent iteration node not found: {}",
                        parent_id
                    )))
                }
            }
        }
    }

    // 3. 添加所有边
    let mut edges = Vec::with_capacity(dsl.edges.len());
    for (index, edge_schema) in dsl.edges.iter().enumerate() {
        let source = nodes.get(&edge_schema.source).ok_or_else(|| {
            FlowError::GraphBuildError(format!("Source node not found: {}", edge_schema.source))
        })?;
        let target = nodes.get(&edge_schema.target).ok_or_else(|| {
            FlowError::GraphBuildError(format!("Target node not found: {}", edge_schema.target))
        })?;
        if source.parent_id != target.parent_id {
            return Err(FlowError::GraphBuildError(format!(
                "Edge {} -> {} crosses an iteration scope",
                source.id, target.id
            )));
        }

        edges.push(FlowEdge {
            id: if edge_schema.id.is_empty() {
                format!("{}-{}-{}", edge_schema.source, edge_schema.target, index)
            } else {
                edge_schema.id.clone()
            },
            source: edge_schema.source.clone(),
            target: edge_schema.target.clone(),
            source_output_index: edge_schema.output_index(),
        });
    }

    Ok(FlowDefinition {
        nodes,
        order,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: serde_json::Value) -> FlowSchema {
        serde_json::from_value(value).unwrap()
    }

    fn branching_schema() -> FlowSchema {
        schema(json!({
            "nodes": [
                {"id": "start", "data": {"type": "start"}},
                {"id": "decision", "data": {"type": "decision"}},
                {"id": "a", "data": {"type": "llm"}},
                {"id": "b", "data": {"type": "llm"}},
                {"id": "join", "data": {"type": "end", "title": "Join"}}
            ],
            "edges": [
                {"source": "start", "target": "decision"},
                {"source": "decision", "target": "a", "source_output_index": 0},
                {"source": "decision", "target": "b", "source_output_index": 1},
                {"source": "a", "target": "join"},
                {"source": "b", "target": "join"}
            ]
        }))
    }

    #[test]
    fn test_build_adjacency_maps() {
        let def = Arc::new(build_graph(&branching_schema()).unwrap());
        let graph = FlowGraph::top_level(def);

        assert_eq!(graph.children("decision"), ["a", "b"]);
        assert_eq!(graph.parents("join"), ["a", "b"]);
        assert!(graph.parents("start").is_empty());
        assert!(graph.children("join").is_empty());
        assert_eq!(graph.forward().len(), 5);
        assert_eq!(graph.reverse().len(), 5);
    }

    #[test]
    fn test_start_node_and_labels() {
        let def = Arc::new(build_graph(&branching_schema()).unwrap());
        let graph = FlowGraph::top_level(def);

        assert_eq!(graph.start_node_id().unwrap(), "start");
        assert_eq!(graph.node("join").unwrap().label, "Join");
        assert_eq!(graph.node("a").unwrap().label, "a");
    }

    #[test]
    fn test_outgoing_edges_keep_slots() {
        let def = Arc::new(build_graph(&branching_schema()).unwrap());
        let graph = FlowGraph::top_level(def);
        let slots: Vec<(String, usize)> = graph
            .outgoing_edges("decision")
            .map(|e| (e.target.clone(), e.source_output_index))
            .collect();
        assert_eq!(slots, vec![("a".to_string(), 0), ("b".to_string(), 1)]);
    }

    #[test]
    fn test_multiple_start_nodes() {
        let s = schema(json!({
            "nodes": [
                {"id": "a", "data": {"type": "start"}},
                {"id": "b", "data": {"type": "start"}}
            ]
        }));
        let graph = FlowGraph::top_level(Arc::new(build_graph(&s).unwrap()));
        match graph.start_node_id() {
            Err(FlowError::MultipleStartNodes(ids)) => assert_eq!(ids, vec!["a", "b"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_no_start_node() {
        let s = schema(json!({"nodes": []}));
        let graph = FlowGraph::top_level(Arc::new(build_graph(&s).unwrap()));
        assert!(matches!(graph.start_node_id(), Err(FlowError::NoStartNode)));
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let s = schema(json!({
            "nodes": [
                {"id": "a", "data": {"type": "start"}},
                {"id": "a", "data": {"type": "end"}}
            ]
        }));
        assert!(matches!(build_graph(&s), Err(FlowError::GraphBuildError(_))));
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let s = schema(json!({
            "nodes": [{"id": "a", "data": {"type": "start"}}],
            "edges": [{"source": "a", "target": "missing"}]
        }));
        let err = build_graph(&s).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    fn iteration_schema() -> FlowSchema {
        schema(json!({
            "nodes": [
                {"id": "start", "data": {"type": "start"}},
                {"id": "iter", "data": {"type": "iteration"}},
                {"id": "body_a", "parent_id": "iter", "data": {"type": "llm"}},
                {"id": "body_b", "parent_id": "iter", "data": {"type": "llm"}},
                {"id": "end", "data": {"type": "end"}}
            ],
            "edges": [
                {"source": "start", "target": "iter"},
                {"source": "iter", "target": "end"},
                {"source": "body_a", "target": "body_b"}
            ]
        }))
    }

    #[test]
    fn test_scoped_views_partition_nodes() {
        let def = Arc::new(build_graph(&iteration_schema()).unwrap());
        let top = FlowGraph::top_level(def.clone());
        let body = FlowGraph::scoped(def.clone(), Some("iter"));

        assert!(top.contains("iter"));
        assert!(!top.contains("body_a"));
        assert_eq!(top.start_node_id().unwrap(), "start");

        assert!(body.contains("body_a"));
        assert!(!body.contains("start"));
        assert_eq!(body.start_node_id().unwrap(), "body_a");
        assert_eq!(body.children("body_a"), ["body_b"]);

        assert_eq!(def.top_level_ancestor("body_b").as_deref(), Some("iter"));
        assert_eq!(def.top_level_ancestor("end").as_deref(), Some("end"));
        assert!(def.is_within_scope("body_b", "iter"));
        assert!(!def.is_within_scope("end", "iter"));
    }

    #[test]
    fn test_scope_crossing_edge_rejected() {
        let mut s = iteration_schema();
        s.edges.push(serde_json::from_value(json!({"source": "start", "target": "body_a"})).unwrap());
        let err = build_graph(&s).unwrap_err();
        assert!(err.to_string().contains("crosses an iteration scope"));
    }

    #[test]
    fn test_parent_must_be_iteration() {
        let s = schema(json!({
            "nodes": [
                {"id": "start", "data": {"type": "start"}},
                {"id": "child", "parent_id": "start", "data": {"type": "llm"}}
            ]
        }));
        assert!(matches!(build_graph(&s), Err(FlowError::GraphBuildError(_))));
    }
}
