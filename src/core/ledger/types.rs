use serde::{Deserialize, Serialize};

use crate::core::run_state::RunRuntimeState;
use crate::dsl::{HumanDecision, NodeOutput};

/// Status of a single ledger entry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Finished,
    Error,
    Stopped,
    Terminated,
}

/// Status of a whole run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    InProgress,
    Finished,
    Error,
    Terminated,
    Stopped,
}

impl From<EntryStatus> for RunStatus {
    fn from(status: EntryStatus) -> Self {
        match status {
            EntryStatus::Finished => RunStatus::Finished,
            EntryStatus::Error => RunStatus::Error,
            EntryStatus::Stopped => RunStatus::Stopped,
            EntryStatus::Terminated => RunStatus::Terminated,
        }
    }
}

/// Marks an entry as produced by element `index` of iteration node `iteration_node_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IterationTag {
    pub iteration_node_id: String,
    pub index: usize,
}

/// Attached to a STOPPED entry: what the caller needs to resume.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResumeAction {
    pub id: String,
    pub node_id: String,
    pub node_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub options: Vec<HumanDecision>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub node_id: String,
    pub node_label: String,
    pub node_type: String,
    /// Input the node was invoked with; replayed when the node is resumed.
    #[serde(default)]
    pub input: NodeOutput,
    #[serde(default)]
    pub output: NodeOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub previous_node_ids: Vec<String>,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<IterationTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ResumeAction>,
    pub recorded_at: i64,
}

impl LedgerEntry {
    pub fn is_top_level(&self) -> bool {
        self.iteration.is_none()
    }
}

/// Everything persisted for one execution id.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub entries: Vec<LedgerEntry>,
    #[serde(default)]
    pub runtime_state: RunRuntimeState,
    pub updated_at: i64,
}

/// Run status implied by a sequence of top-level entries:
/// TERMINATED, then ERROR, then STOPPED, else FINISHED.
pub fn aggregate_status<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> RunStatus {
    let mut has_error = false;
    let mut has_stopped = false;

    for entry in entries.into_iter().filter(|e| e.is_top_level()) {
        match entry.status {
            EntryStatus::Terminated => return RunStatus::Terminated,
            EntryStatus::Error => has_error = true,
            EntryStatus::Stopped => has_stopped = true,
            EntryStatus::Finished => {}
        }
    }

    if has_error {
        RunStatus::Error
    } else if has_stopped {
        RunStatus::Stopped
    } else {
        RunStatus::Finished
    }
}

#[cfg(test)]
pub(crate) fn sample_entry(node_id: &str, status: EntryStatus) -> LedgerEntry {
    LedgerEntry {
        node_id: node_id.to_string(),
        node_label: node_id.to_string(),
        node_type: "llm".to_string(),
        input: NodeOutput::default(),
        output: NodeOutput::default(),
        error: None,
        previous_node_ids: Vec::new(),
        status,
        iteration: None,
        action: None,
        recorded_at: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_precedence() {
        use EntryStatus::*;
        let entries = |statuses: &[EntryStatus]| -> Vec<LedgerEntry> {
            statuses.iter().map(|s| sample_entry("n", *s)).collect()
        };

        assert_eq!(aggregate_status(&entries(&[])), RunStatus::Finished);
        assert_eq!(aggregate_status(&entries(&[Finished, Finished])), RunStatus::Finished);
        assert_eq!(aggregate_status(&entries(&[Finished, Stopped])), RunStatus::Stopped);
        assert_eq!(aggregate_status(&entries(&[Stopped, Error])), RunStatus::Error);
        assert_eq!(
            aggregate_status(&entries(&[Error, Terminated, Stopped])),
            RunStatus::Terminated
        );
    }

    #[test]
    fn test_aggregate_ignores_iteration_entries() {
        let mut inner = sample_entry("body", EntryStatus::Error);
        inner.iteration = Some(IterationTag {
            iteration_node_id: "iter".into(),
            index: 1,
        });
        let entries = vec![sample_entry("start", EntryStatus::Finished), inner];
        assert_eq!(aggregate_status(&entries), RunStatus::Finished);
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_value(RunStatus::InProgress).unwrap(),
            serde_json::json!("IN_PROGRESS")
        );
        assert_eq!(
            serde_json::to_value(EntryStatus::Stopped).unwrap(),
            serde_json::json!("STOPPED")
        );
    }
}
