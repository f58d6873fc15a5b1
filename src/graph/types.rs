use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node type tags that gate downstream branches. Membership in this set is the
/// only node property dependency analysis looks at.
pub const DECISION_NODE_TYPES: &[&str] = &["decision", "decision-agent", "human-checkpoint"];

/// 节点调度类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Ordinary,
    Decision,
    DecisionAgent,
    HumanCheckpoint,
    Loop,
    Iteration,
    Terminal,
}

impl NodeKind {
    /// 从节点类型字符串解析调度类别
    pub fn from_node_type(node_type: &str) -> Self {
        match node_type {
            "decision" => NodeKind::Decision,
            "decision-agent" => NodeKind::DecisionAgent,
            "human-checkpoint" => NodeKind::HumanCheckpoint,
            "loop" => NodeKind::Loop,
            "iteration" => NodeKind::Iteration,
            "end" | "terminal" => NodeKind::Terminal,
            _ => NodeKind::Ordinary,
        }
    }

    pub fn is_decision(&self) -> bool {
        matches!(
            self,
            NodeKind::Decision | NodeKind::DecisionAgent | NodeKind::HumanCheckpoint
        )
    }
}

/// 图节点
#[derive(Debug, Clone)]
pub struct FlowNode {
    /// 节点 ID（对应 DSL 中的 id）
    pub id: String,

    /// 节点类型（用于查找 node unit）
    pub node_type: String,

    /// 调度类别
    pub kind: NodeKind,

    /// 节点标题
    pub label: String,

    /// 节点配置（对应 DSL 中 data 的其余字段）
    pub config: Value,

    /// 所属的迭代节点
    pub parent_id: Option<String>,
}

/// 图边
#[derive(Debug, Clone)]
pub struct FlowEdge {
    /// 边 ID
    pub id: String,

    /// 源节点 ID
    pub source: String,

    /// 目标节点 ID
    pub target: String,

    /// 源节点的输出槽位
    pub source_output_index: usize,
}
