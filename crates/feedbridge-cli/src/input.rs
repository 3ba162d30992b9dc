//! Input records and schema seed files.

use std::path::Path;

use anyhow::{Context, bail};
use feedbridge_core::Record;
use feedbridge_schema::{InMemoryRegistry, SchemaSpec};
use serde_json::Value;

/// Definition name given to records read from JSON input.
pub const RECORD_NAME: &str = "input";

/// Parse one JSON object into a record whose fields are its keys.
pub fn parse_record(text: &str) -> anyhow::Result<Record> {
    match serde_json::from_str::<Value>(text).context("parsing record JSON")? {
        Value::Object(map) => Ok(Record::from_json_object(RECORD_NAME, map)),
        other => bail!("record must be a JSON object, got {}", kind(&other)),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Build a registry from an optional JSON array of `{name, fields}` entries.
pub fn load_registry(path: Option<&Path>) -> anyhow::Result<InMemoryRegistry> {
    let Some(path) = path else {
        return Ok(InMemoryRegistry::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading schemas from {}", path.display()))?;
    let specs: Vec<SchemaSpec> = serde_json::from_str(&text)
        .with_context(|| format!("parsing schemas in {}", path.display()))?;
    Ok(InMemoryRegistry::from_specs(specs)?)
}
