//! Resume planning: decide whether a stored execution can be resumed and
//! where scheduling restarts.

use crate::core::ledger::{
    EntryStatus, ExecutionRecord, IterationTag, LedgerEntry, LedgerStore, RunStatus,
};
use crate::core::run_state::RunRuntimeState;
use crate::dsl::{HumanInput, NodeOutput};
use crate::error::FlowError;
use crate::graph::{FlowDefinition, NodeKind};

/// One restart point. The first step is in the top-level scope; each further
/// step sits inside the iteration element named by its tag.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeStep {
    pub node_id: String,
    pub input: NodeOutput,
    pub previous_node_ids: Vec<String>,
    pub iteration: Option<IterationTag>,
}

#[derive(Debug, Clone)]
pub struct ResumePlan {
    /// Node whose first invocation receives the human answer.
    pub answer_node_id: String,
    /// Restart points from the top level down to the answer node.
    pub steps: Vec<ResumeStep>,
    pub runtime_state: RunRuntimeState,
    /// Entries recorded before this attempt.
    pub prior_entries: Vec<LedgerEntry>,
    /// The stored ledger still ends with an ERROR entry after the STOPPED one.
    /// It is left out of `prior_entries` but only removed from the store once
    /// the scheduler commits to the resume.
    pub discard_trailing_error: bool,
}

impl ResumePlan {
    pub fn start_node_id(&self) -> &str {
        self.steps
            .first()
            .map(|step| step.node_id.as_str())
            .unwrap_or(self.answer_node_id.as_str())
    }
}

/// Load `execution_id`, check that it is resumable and compute the restart
/// plan. Nothing is written to the store.
pub async fn prepare_resume(
    store: &dyn LedgerStore,
    definition: &FlowDefinition,
    execution_id: &str,
    human_input: &HumanInput,
) -> Result<ResumePlan, FlowError> {
    let mut record = store
        .load(execution_id)
        .await?
        .ok_or_else(|| FlowError::ExecutionNotFound(execution_id.to_string()))?;

    let discard = check_resumable(&record)?;
    if discard {
        record.entries.pop();
        record.status = RunStatus::Stopped;
    }

    let mut plan = plan_resume(definition, record, human_input)?;
    plan.discard_trailing_error = discard;
    Ok(plan)
}

/// `Ok(true)` when the record is resumable only after its trailing ERROR entry
/// is discarded, `Ok(false)` when it is resumable as is.
pub fn check_resumable(record: &ExecutionRecord) -> Result<bool, FlowError> {
    let reject = |reason: String| FlowError::ResumeRejected {
        execution_id: record.execution_id.clone(),
        reason,
    };

    match record.status {
        RunStatus::Stopped => Ok(false),
        RunStatus::Error if crate::core::ledger::ends_with_error_after_stop(&record.entries) => {
            Ok(true)
        }
        RunStatus::Error => Err(reject(
            "run failed outside of a human checkpoint".to_string(),
        )),
        other => Err(reject(format!("run status is {:?}", other))),
    }
}

/// Compute the restart steps for an already validated record.
pub fn plan_resume(
    definition: &FlowDefinition,
    record: ExecutionRecord,
    human_input: &HumanInput,
) -> Result<ResumePlan, FlowError> {
    let entries = &record.entries;
    let reject = |reason: &str| FlowError::ResumeRejected {
        execution_id: record.execution_id.clone(),
        reason: reason.to_string(),
    };

    let answer_pos = match human_input.node_id.as_deref() {
        Some(node_id) => {
            if definition.node(node_id).is_none() {
                return Err(FlowError::NodeNotFound(node_id.to_string()));
            }
            last_position(entries, entries.len(), |e| {
                e.node_id == node_id && e.status == EntryStatus::Stopped
            })
            .or_else(|| last_position(entries, entries.len(), |e| e.node_id == node_id))
            .ok_or_else(|| reject("requested node has no recorded invocation"))?
        }
        None => descend_to_stopped(definition, entries)
            .ok_or_else(|| reject("no stopped node in the ledger"))?,
    };

    let mut steps = Vec::new();
    let mut pos = answer_pos;
    loop {
        let entry = &entries[pos];
        steps.push(ResumeStep {
            node_id: entry.node_id.clone(),
            input: entry.input.clone(),
            previous_node_ids: entry.previous_node_ids.clone(),
            iteration: entry.iteration.clone(),
        });
        let Some(tag) = &entry.iteration else {
            break;
        };
        pos = last_position(entries, pos, |e| {
            e.node_id == tag.iteration_node_id && e.status == EntryStatus::Stopped
        })
        .or_else(|| last_position(entries, pos, |e| e.node_id == tag.iteration_node_id))
        .ok_or_else(|| reject("iteration node of the stopped entry was never recorded"))?;
    }
    steps.reverse();

    Ok(ResumePlan {
        answer_node_id: entries[answer_pos].node_id.clone(),
        steps,
        runtime_state: record.runtime_state.clone(),
        prior_entries: record.entries.clone(),
        discard_trailing_error: false,
    })
}

/// Most recent top-level STOPPED entry, descending through iteration nodes into
/// the most recent STOPPED entry of their elements.
fn descend_to_stopped(definition: &FlowDefinition, entries: &[LedgerEntry]) -> Option<usize> {
    let mut pos = last_position(entries, entries.len(), |e| {
        e.is_top_level() && e.status == EntryStatus::Stopped
    })?;

    loop {
        let entry = &entries[pos];
        let is_iteration = definition
            .node(&entry.node_id)
            .is_some_and(|n| n.kind == NodeKind::Iteration);
        if !is_iteration {
            return Some(pos);
        }
        let inner = last_position(entries, pos, |e| {
            e.status == EntryStatus::Stopped
                && e
                    .iteration
                    .as_ref()
                    .is_some_and(|t| t.iteration_node_id == entry.node_id)
        });
        match inner {
            Some(inner) => pos = inner,
            None => return Some(pos),
        }
    }
}

fn last_position(
    entries: &[LedgerEntry],
    before: usize,
    predicate: impl Fn(&LedgerEntry) -> bool,
) -> Option<usize> {
    entries[..before.min(entries.len())]
        .iter()
        .rposition(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::{sample_entry, MemoryLedgerStore};
    use crate::dsl::FlowSchema;
    use crate::graph::build_graph;
    use serde_json::json;

    fn definition() -> FlowDefinition {
        let schema: FlowSchema = serde_json::from_value(json!({
            "nodes": [
                {"id": "start", "data": {"type": "start"}},
                {"id": "review", "data": {"type": "human-checkpoint"}},
                {"id": "iter", "data": {"type": "iteration"}},
                {"id": "ask", "parent_id": "iter", "data": {"type": "human-checkpoint"}},
                {"id": "end", "data": {"type": "end"}}
            ],
            "edges": [
                {"source": "start", "target": "review"},
                {"source": "review", "target": "iter"},
                {"source": "iter", "target": "end"}
            ]
        }))
        .unwrap();
        build_graph(&schema).unwrap()
    }

    fn record(status: RunStatus, entries: Vec<LedgerEntry>) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: "exec".to_string(),
            status,
            entries,
            runtime_state: RunRuntimeState::default(),
            updated_at: 0,
        }
    }

    fn tagged(node_id: &str, status: EntryStatus, iter: &str, index: usize) -> LedgerEntry {
        let mut entry = sample_entry(node_id, status);
        entry.iteration = Some(IterationTag {
            iteration_node_id: iter.to_string(),
            index,
        });
        entry
    }

    #[test]
    fn test_check_resumable() {
        let stopped = record(
            RunStatus::Stopped,
            vec![sample_entry("review", EntryStatus::Stopped)],
        );
        assert!(!check_resumable(&stopped).unwrap());

        let error_after_stop = record(
            RunStatus::Error,
            vec![
                sample_entry("review", EntryStatus::Stopped),
                sample_entry("review", EntryStatus::Error),
            ],
        );
        assert!(check_resumable(&error_after_stop).unwrap());

        let plain_error = record(
            RunStatus::Error,
            vec![
                sample_entry("start", EntryStatus::Finished),
                sample_entry("review", EntryStatus::Error),
            ],
        );
        assert!(matches!(
            check_resumable(&plain_error),
            Err(FlowError::ResumeRejected { .. })
        ));

        let finished = record(RunStatus::Finished, vec![]);
        assert!(check_resumable(&finished).is_err());
        let terminated = record(RunStatus::Terminated, vec![]);
        assert!(check_resumable(&terminated).is_err());
    }

    #[test]
    fn test_plan_uses_last_stopped_top_level_entry() {
        let mut review = sample_entry("review", EntryStatus::Stopped);
        review.input = NodeOutput::text("draft");
        review.previous_node_ids = vec!["start".into()];
        let rec = record(
            RunStatus::Stopped,
            vec![sample_entry("start", EntryStatus::Finished), review],
        );

        let plan = plan_resume(&definition(), rec, &HumanInput::proceed()).unwrap();
        assert_eq!(plan.answer_node_id, "review");
        assert_eq!(plan.start_node_id(), "review");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].input, NodeOutput::text("draft"));
        assert_eq!(plan.steps[0].previous_node_ids, vec!["start"]);
        assert_eq!(plan.prior_entries.len(), 2);
    }

    #[test]
    fn test_plan_descends_into_iteration() {
        let mut ask = tagged("ask", EntryStatus::Stopped, "iter", 2);
        ask.input = NodeOutput::text("element two");
        let mut iter = sample_entry("iter", EntryStatus::Stopped);
        iter.input = NodeOutput::json(json!(["a", "b", "c"]));
        let rec = record(
            RunStatus::Stopped,
            vec![
                sample_entry("start", EntryStatus::Finished),
                sample_entry("review", EntryStatus::Finished),
                tagged("ask", EntryStatus::Finished, "iter", 0),
                tagged("ask", EntryStatus::Finished, "iter", 1),
                ask,
                iter,
            ],
        );

        let plan = plan_resume(&definition(), rec, &HumanInput::reject()).unwrap();
        assert_eq!(plan.answer_node_id, "ask");
        assert_eq!(plan.start_node_id(), "iter");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].input, NodeOutput::json(json!(["a", "b", "c"])));
        assert_eq!(
            plan.steps[1].iteration,
            Some(IterationTag {
                iteration_node_id: "iter".into(),
                index: 2
            })
        );
        assert_eq!(plan.steps[1].input, NodeOutput::text("element two"));
    }

    #[test]
    fn test_plan_with_explicit_node() {
        let rec = record(
            RunStatus::Stopped,
            vec![
                sample_entry("start", EntryStatus::Finished),
                sample_entry("review", EntryStatus::Stopped),
            ],
        );
        let plan = plan_resume(
            &definition(),
            rec.clone(),
            &HumanInput::proceed().at_node("review"),
        )
        .unwrap();
        assert_eq!(plan.answer_node_id, "review");

        assert!(matches!(
            plan_resume(&definition(), rec.clone(), &HumanInput::proceed().at_node("ghost")),
            Err(FlowError::NodeNotFound(_))
        ));
        assert!(matches!(
            plan_resume(&definition(), rec, &HumanInput::proceed().at_node("end")),
            Err(FlowError::ResumeRejected { .. })
        ));
    }

    fn error_after_stop() -> ExecutionRecord {
        record(
            RunStatus::Error,
            vec![
                sample_entry("start", EntryStatus::Finished),
                sample_entry("review", EntryStatus::Stopped),
                sample_entry("review", EntryStatus::Error),
            ],
        )
    }

    #[tokio::test]
    async fn test_prepare_resume_skips_trailing_error_without_writing() {
        let store = MemoryLedgerStore::new();
        store.overwrite(&error_after_stop()).await.unwrap();

        let plan = prepare_resume(&store, &definition(), "exec", &HumanInput::proceed())
            .await
            .unwrap();
        assert_eq!(plan.answer_node_id, "review");
        assert_eq!(plan.prior_entries.len(), 2);
        assert!(plan.discard_trailing_error);

        let stored = store.load("exec").await.unwrap().unwrap();
        assert_eq!(stored.entries.len(), 3);
        assert_eq!(stored.status, RunStatus::Error);
    }

    #[tokio::test]
    async fn test_rejected_resume_leaves_ledger_untouched() {
        let store = MemoryLedgerStore::new();
        store.overwrite(&error_after_stop()).await.unwrap();

        for answer in [
            HumanInput::proceed().at_node("ghost"),
            HumanInput::proceed().at_node("end"),
        ] {
            assert!(prepare_resume(&store, &definition(), "exec", &answer)
                .await
                .is_err());
        }

        let stored = store.load("exec").await.unwrap().unwrap();
        assert_eq!(stored.entries.len(), 3);
        assert_eq!(stored.entries[2].status, EntryStatus::Error);
        assert_eq!(stored.status, RunStatus::Error);
    }

    #[tokio::test]
    async fn test_prepare_resume_unknown_execution() {
        let store = MemoryLedgerStore::new();
        assert!(matches!(
            prepare_resume(&store, &definition(), "missing", &HumanInput::proceed()).await,
            Err(FlowError::ExecutionNotFound(_))
        ));
    }
}
