mod common;

use std::sync::Arc;

use serde_json::json;

use agentflow::{create_event_channel, FlowEvent, HumanInput, MemoryLedgerStore, RunStatus};
use common::{call_log, calls_of, runner, yaml};

#[tokio::test]
async fn test_failed_element_does_not_stop_iteration() {
    let schema = yaml(
        r#"
nodes:
  - id: start
    data: {type: start}
  - id: each
    data:
      type: iteration
      items: [1, 2, 3, 4, 5]
  - id: work
    parent_id: each
    data:
      type: task
      fail_on_index: 1
      state:
        last: "{{iteration.value}}"
  - id: end
    data: {type: end}
edges:
  - {source: start, target: each}
  - {source: each, target: end}
"#,
    );
    let calls = call_log();
    let (tx, mut rx) = create_event_channel();
    let outcome = runner(schema, &calls).events(tx).run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Finished);
    assert_eq!(calls_of(&calls, "work"), 5);
    assert_eq!(
        outcome.output.text.as_deref(),
        Some("1>work\nError in iteration 1: Execution error: boom\n3>work\n4>work\n5>work")
    );
    assert_eq!(outcome.runtime_state.state.get("last"), Some(&json!(5)));

    let element_errors: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|event| match event {
            FlowEvent::IterationElementFinished { index, error, .. } => Some((index, error.is_some())),
            _ => None,
        })
        .collect();
    assert_eq!(
        element_errors,
        vec![(0, false), (1, true), (2, false), (3, false), (4, false)]
    );
}

#[tokio::test]
async fn test_items_from_upstream_json() {
    let schema = yaml(
        r#"
nodes:
  - id: start
    data:
      type: start
      output: [x, y]
  - id: each
    data: {type: iteration}
  - id: work
    parent_id: each
    data: {type: task}
  - id: next
    parent_id: each
    data: {type: task}
edges:
  - {source: start, target: each}
  - {source: work, target: next}
"#,
    );
    let calls = call_log();
    let outcome = runner(schema, &calls).run().await.unwrap();

    assert_eq!(outcome.status, RunStatus::Finished);
    assert_eq!(
        outcome.output.text.as_deref(),
        Some("x>work>next\ny>work>next")
    );
    assert_eq!(
        *calls.lock(),
        vec!["work#0", "next#0", "work#1", "next#1"]
    );
    let tagged = outcome
        .ledger
        .iter()
        .filter(|e| e.iteration.is_some())
        .count();
    assert_eq!(tagged, 4);
}

#[tokio::test]
async fn test_element_state_merges_last_write_wins() {
    let schema = yaml(
        r#"
nodes:
  - id: start
    data: {type: start}
  - id: each
    data:
      type: iteration
      items: [a, b]
  - id: work
    parent_id: each
    data:
      type: task
      state:
        seen: "{{iteration.value}}"
        first: "{{iteration.is_first}}"
edges:
  - {source: start, target: each}
"#,
    );
    let outcome = runner(schema, &call_log())
        .initial_state(json!({"seen": "none", "kept": 1}).as_object().cloned().unwrap())
        .run()
        .await
        .unwrap();

    let state = &outcome.runtime_state.state;
    assert_eq!(state.get("seen"), Some(&json!("b")));
    assert_eq!(state.get("first"), Some(&json!(false)));
    assert_eq!(state.get("kept"), Some(&json!(1)));
}

#[tokio::test]
async fn test_checkpoint_inside_iteration_resumes_in_place() {
    let schema = yaml(
        r#"
nodes:
  - id: start
    data: {type: start}
  - id: each
    data:
      type: iteration
      items: [a, b]
  - id: work
    parent_id: each
    data: {type: task}
  - id: gate
    parent_id: each
    data:
      type: human-checkpoint
      prompt: Check element
  - id: end
    data: {type: end}
edges:
  - {source: start, target: each}
  - {source: each, target: end}
  - {source: work, target: gate}
"#,
    );
    let store = Arc::new(MemoryLedgerStore::new());
    let calls = call_log();

    let first = runner(schema.clone(), &calls)
        .ledger_store(store.clone())
        .execution_id("iter-1")
        .run()
        .await
        .unwrap();
    assert_eq!(first.status, RunStatus::Stopped);
    assert_eq!(first.action.as_ref().unwrap().node_id, "gate");
    let stopped_iteration = first.ledger.last().unwrap();
    assert_eq!(stopped_iteration.node_id, "each");
    assert!(stopped_iteration.is_top_level());

    let second = runner(schema.clone(), &calls)
        .ledger_store(store.clone())
        .resume("iter-1", HumanInput::proceed())
        .run()
        .await
        .unwrap();
    assert_eq!(second.status, RunStatus::Stopped);
    assert_eq!(*calls.lock(), vec!["work#0", "work#1"]);
    let gate_stop = second
        .ledger
        .iter()
        .rev()
        .find(|e| e.node_id == "gate")
        .unwrap();
    assert_eq!(gate_stop.iteration.as_ref().map(|t| t.index), Some(1));

    let third = runner(schema, &calls)
        .ledger_store(store.clone())
        .resume("iter-1", HumanInput::proceed())
        .run()
        .await
        .unwrap();
    assert_eq!(third.status, RunStatus::Finished);
    assert_eq!(calls_of(&calls, "work"), 2);
    assert_eq!(third.output.text.as_deref(), Some("a>work\nb>work"));
}
