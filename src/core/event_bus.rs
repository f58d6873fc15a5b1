use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::ledger::{EntryStatus, IterationTag, ResumeAction, RunStatus};
use crate::dsl::NodeOutput;

/// 流程事件 - 调度过程中发出的进度事件
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FlowEvent {
    /// 运行开始（或从暂停处恢复）
    RunStarted {
        execution_id: String,
        resumed: bool,
        timestamp: DateTime<Utc>,
    },

    /// 节点开始执行
    NodeStarted {
        execution_id: String,
        node_id: String,
        node_label: String,
        iteration: Option<IterationTag>,
        timestamp: DateTime<Utc>,
    },

    /// 节点执行完成
    NodeFinished {
        execution_id: String,
        node_id: String,
        output: NodeOutput,
        timestamp: DateTime<Utc>,
    },

    /// 节点等待人工输入
    NodeStopped {
        execution_id: String,
        node_id: String,
        action: ResumeAction,
    },

    /// 节点执行失败或被取消
    NodeFailed {
        execution_id: String,
        node_id: String,
        status: EntryStatus,
        error: String,
    },

    /// 决策节点未选中的分支
    BranchesIgnored {
        execution_id: String,
        node_id: String,
        ignored: Vec<String>,
    },

    /// 循环达到上限，使用回退消息
    LoopFallback {
        execution_id: String,
        node_id: String,
        loop_count: u32,
    },

    /// 迭代元素完成
    IterationElementFinished {
        execution_id: String,
        node_id: String,
        index: usize,
        error: Option<String>,
    },

    /// 运行状态变化
    RunStatusChanged {
        execution_id: String,
        status: RunStatus,
        timestamp: DateTime<Utc>,
    },
}

/// 事件发送器
pub type EventSender = mpsc::UnboundedSender<FlowEvent>;

/// 事件接收器
pub type EventReceiver = mpsc::UnboundedReceiver<FlowEvent>;

/// 创建事件通道
pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Fire-and-forget wrapper around an optional event sender. A missing or
/// closed receiver never affects scheduling.
#[derive(Clone, Default)]
pub struct EventEmitter {
    tx: Option<EventSender>,
}

impl EventEmitter {
    pub fn new(tx: EventSender) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_active(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    pub fn emit(&self, event: FlowEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::trace!("event receiver dropped, discarding event");
            }
        }
    }
}
