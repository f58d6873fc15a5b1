//! DSL parser: converts raw YAML/JSON/TOML text into [`FlowSchema`].

use super::schema::{FlowSchema, SUPPORTED_DSL_VERSIONS};
use crate::error::FlowError;

/// Supported DSL input formats.
#[derive(Debug, Clone, Copy)]
pub enum DslFormat {
    /// YAML format (`.yaml` / `.yml`).
    Yaml,
    /// JSON format (`.json`).
    Json,
    /// TOML format (`.toml`).
    Toml,
}

impl DslFormat {
    /// Guess the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(DslFormat::Yaml),
            "json" => Some(DslFormat::Json),
            "toml" => Some(DslFormat::Toml),
            _ => None,
        }
    }
}

/// Parse a flow document and check its `version`.
pub fn parse_dsl(content: &str, format: DslFormat) -> Result<FlowSchema, FlowError> {
    let schema: FlowSchema = match format {
        DslFormat::Yaml => serde_saphyr::from_str(content).map_err(parse_error)?,
        DslFormat::Json => serde_json::from_str(content).map_err(parse_error)?,
        DslFormat::Toml => {
            // free-form node config must come out as plain JSON values
            let document: toml::Value = toml::from_str(content).map_err(parse_error)?;
            serde_json::from_value(toml_value_to_json(document)).map_err(parse_error)?
        }
    };
    check_version(&schema)?;
    Ok(schema)
}

fn parse_error(err: impl std::fmt::Display) -> FlowError {
    FlowError::DslParseError(err.to_string())
}

fn check_version(schema: &FlowSchema) -> Result<(), FlowError> {
    if SUPPORTED_DSL_VERSIONS.contains(&schema.version.as_str()) {
        Ok(())
    } else {
        Err(FlowError::UnsupportedVersion {
            found: schema.version.clone(),
            supported: SUPPORTED_DSL_VERSIONS.join(", "),
        })
    }
}

/// TOML to JSON. Datetimes become their RFC 3339 string form.
pub(crate) fn toml_value_to_json(value: toml::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_value_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_value_to_json(value)))
                .collect(),
        ),
        scalar => serde_json::to_value(scalar).unwrap_or(Value::Null),
    }
}
