use std::error::Error;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use agentflow::dsl::{parse_dsl, DslFormat};
use agentflow::{
    FlowRunner, HumanInput, NodeError, NodeExecutor, NodeOutput, NodeRunResult, RunContext,
    RunOutcome, RunStatus,
};

const DEMO_FLOW: &str = r#"
version: "0.1.0"
nodes:
  - id: start
    data:
      type: start
      title: Start
      output: "Write a short note about {{state.topic}}"
  - id: draft
    data:
      type: draft
      title: Draft
  - id: review
    data:
      type: human-checkpoint
      title: Review
      prompt: "Publish this draft?"
  - id: publish
    data:
      type: end
      title: Publish
      output: "Published note on {{state.topic}}"
  - id: rework
    data:
      type: loop
      title: Rework
      loop_back_to: draft
      max_loop_count: 3
      fallback_message: "Gave up after three drafts"
edges:
  - source: start
    target: draft
  - source: draft
    target: review
  - source: review
    target: publish
    sourceHandle: review-output-0
  - source: review
    target: rework
    sourceHandle: review-output-1
"#;

/// Stand-in for a model call: numbers each draft and counts them in `state.drafts`.
struct Drafter;

#[async_trait]
impl NodeExecutor for Drafter {
    async fn execute(
        &self,
        _config: &Value,
        input: &NodeOutput,
        context: &RunContext,
    ) -> Result<NodeRunResult, NodeError> {
        let count = context
            .runtime
            .state
            .get("drafts")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            + 1;
        let mut result = NodeRunResult::with_output(NodeOutput::text(format!(
            "draft #{}: {}",
            count,
            input.text_or_empty()
        )));
        result.state = json!({ "drafts": count }).as_object().cloned();
        Ok(result)
    }
}

fn print_outcome(outcome: &RunOutcome) {
    println!("\n=== Run {} -> {:?} ===", outcome.execution_id, outcome.status);
    for entry in &outcome.ledger {
        println!(
            "  [{:?}] {} ({})",
            entry.status,
            entry.node_id,
            entry.output.to_text()
        );
    }
    if let Some(action) = &outcome.action {
        println!(
            "  waiting at {}: {}",
            action.node_id,
            action.prompt.as_deref().unwrap_or_default()
        );
    } else {
        println!("  output: {}", outcome.output.to_text());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== agentflow ===\n");

    let schema = match std::env::args().nth(1) {
        Some(path) => {
            let format = Path::new(&path)
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(DslFormat::from_extension)
                .ok_or_else(|| format!("cannot infer DSL format from '{}'", path))?;
            parse_dsl(&std::fs::read_to_string(&path)?, format)?
        }
        None => parse_dsl(DEMO_FLOW, DslFormat::Yaml)?,
    };
    println!(
        "[OK] DSL parsed ({} nodes, {} edges)",
        schema.nodes.len(),
        schema.edges.len()
    );

    let initial_state = json!({ "topic": "autumn" })
        .as_object()
        .cloned()
        .unwrap_or_default();

    let ledger = std::sync::Arc::new(agentflow::MemoryLedgerStore::new());
    let outcome = FlowRunner::builder(schema.clone())
        .executor("draft", Box::new(Drafter))
        .ledger_store(ledger.clone())
        .initial_state(initial_state)
        .run()
        .await?;
    print_outcome(&outcome);

    if outcome.status == RunStatus::Stopped {
        let resumed = FlowRunner::builder(schema)
            .executor("draft", Box::new(Drafter))
            .ledger_store(ledger)
            .resume(
                outcome.execution_id.clone(),
                HumanInput::proceed().with_feedback("looks good"),
            )
            .run()
            .await?;
        print_outcome(&resumed);
    }

    Ok(())
}
