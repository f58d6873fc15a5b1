use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::core::run_state::RunContext;
use crate::error::{NodeError, NodeResult};

/// Resolves a node's declarative configuration against the run context. Called
/// immediately before each invocation; failures surface as node errors.
pub trait ConfigResolver: Send + Sync {
    fn resolve(&self, config: &Value, context: &RunContext) -> NodeResult<Value>;
}

/// `{{ path }}` placeholder substitution over every string in the config.
///
/// Supported roots: `state.*`, `form.*`, `iteration.index`, `iteration.value[.*]`,
/// `human.feedback`, `human.decision` and `execution_id`. A string consisting of
/// exactly one placeholder resolves to the raw JSON value.
#[derive(Debug, Clone, Default)]
pub struct TemplateResolver {
    /// 未知变量报错（否则保留原文）
    pub strict: bool,
}

impl TemplateResolver {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    fn resolve_value(&self, value: &Value, context: &RunContext) -> Result<Value, NodeError> {
        match value {
            Value::String(text) => self.resolve_string(text, context),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item, context))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut resolved = serde_json::Map::with_capacity(map.len());
                for (key, item) in map {
                    resolved.insert(key.clone(), self.resolve_value(item, context)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&self, text: &str, context: &RunContext) -> Result<Value, NodeError> {
        let re = placeholder()?;

        if let Some(caps) = re.captures(text) {
            if caps.get(0).is_some_and(|m| m.len() == text.len()) {
                let path = caps[1].trim();
                return match lookup(path, context) {
                    Some(value) => Ok(value),
                    None => self.missing(path).map(|_| Value::String(text.to_string())),
                };
            }
        } else {
            return Ok(Value::String(text.to_string()));
        }

        let mut rendered = String::with_capacity(text.len());
        let mut last = 0;
        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            rendered.push_str(&text[last..whole.start()]);
            let path = caps[1].trim();
            match lookup(path, context) {
                Some(Value::String(s)) => rendered.push_str(&s),
                Some(Value::Null) => {}
                Some(other) => rendered.push_str(&other.to_string()),
                None => {
                    self.missing(path)?;
                    rendered.push_str(whole.as_str());
                }
            }
            last = whole.end();
        }
        rendered.push_str(&text[last..]);
        Ok(Value::String(rendered))
    }

    fn missing(&self, path: &str) -> Result<(), NodeError> {
        if self.strict {
            Err(NodeError::TemplateError(format!(
                "Unresolved template variable: {}",
                path
            )))
        } else {
            Ok(())
        }
    }
}

impl ConfigResolver for TemplateResolver {
    fn resolve(&self, config: &Value, context: &RunContext) -> Result<Value, NodeError> {
        self.resolve_value(config, context)
    }
}

fn placeholder() -> Result<&'static Regex, NodeError> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").ok())
        .as_ref()
        .ok_or_else(|| NodeError::TemplateError("invalid placeholder pattern".to_string()))
}

fn lookup(path: &str, context: &RunContext) -> Option<Value> {
    let mut segments = path.split('.');
    let root = segments.next()?;
    let rest: Vec<&str> = segments.collect();

    let base = match root {
        "execution_id" => return rest.is_empty().then(|| Value::String(context.execution_id.clone())),
        "state" => Value::Object(context.runtime.state.clone()),
        "form" => Value::Object(context.runtime.form.clone()),
        "iteration" => {
            let iteration = context.iteration.as_ref()?;
            let (field, tail) = rest.split_first()?;
            let value = match *field {
                "index" => Value::from(iteration.index),
                "value" => iteration.value.clone(),
                "is_first" => Value::Bool(iteration.is_first),
                "is_last" => Value::Bool(iteration.is_last),
                _ => return None,
            };
            return descend(value, tail);
        }
        "human" => {
            let human = context.human_input.as_ref()?;
            return match rest.as_slice() {
                ["feedback"] => Some(human.feedback.clone().map(Value::String).unwrap_or(Value::Null)),
                ["decision"] => serde_json::to_value(human.decision).ok(),
                _ => None,
            };
        }
        _ => return None,
    };
    descend(base, &rest)
}

fn descend(mut value: Value, path: &[&str]) -> Option<Value> {
    for segment in path {
        value = match value {
            Value::Object(mut map) => map.remove(*segment)?,
            Value::Array(mut items) => {
                let index: usize = segment.parse().ok()?;
                if index >= items.len() {
                    return None;
                }
                items.swap_remove(index)
            }
            _ => return None,
        };
    }
    Some(value)
}
