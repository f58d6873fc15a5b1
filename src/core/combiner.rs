//! Merging of parent outputs into the input of a ready node.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::dsl::NodeOutput;

/// Combine the outputs received from a node's parents into one input value.
///
/// Empty outputs are dropped. A single remaining output passes through
/// unchanged. Several outputs are merged: structured and binary parts keyed by
/// parent id, text joined with newlines in ascending parent-id order, and the
/// first error (in the same order) carried forward.
pub fn combine_inputs(received: &BTreeMap<String, NodeOutput>) -> NodeOutput {
    let present: Vec<(&String, &NodeOutput)> =
        received.iter().filter(|(_, output)| !output.is_empty()).collect();

    match present.as_slice() {
        [] => NodeOutput::default(),
        [(_, only)] => (*only).clone(),
        many => {
            let mut json = Map::new();
            let mut binary = Map::new();
            let mut texts: Vec<&str> = Vec::new();
            let mut error = None;

            for (parent_id, output) in many {
                if let Some(value) = &output.json {
                    json.insert((*parent_id).clone(), value.clone());
                }
                if let Some(text) = &output.text {
                    texts.push(text);
                }
                if let Some(value) = &output.binary {
                    binary.insert((*parent_id).clone(), value.clone());
                }
                if error.is_none() {
                    error = output.error.clone();
                }
            }

            NodeOutput {
                json: (!json.is_empty()).then_some(Value::Object(json)),
                text: (!texts.is_empty()).then(|| texts.join("\n")),
                binary: (!binary.is_empty()).then_some(Value::Object(binary)),
                error,
            }
        }
    }
}
