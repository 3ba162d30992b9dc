//! Input records and their field definitions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Shape of an input record: a name and its ordered field names.
///
/// Shared by every record produced from the same definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDefinition {
    pub name: String,
    pub fields: Vec<String>,
}

impl RecordDefinition {
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Position of `field` in the definition, if it exists.
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }
}

/// A single input record: one optional value per definition field.
#[derive(Debug, Clone)]
pub struct Record {
    definition: Arc<RecordDefinition>,
    values: Vec<Option<Value>>,
}

impl Record {
    /// Build a record from a definition and values in field order.
    ///
    /// Missing trailing values are treated as absent.
    pub fn new(definition: Arc<RecordDefinition>, mut values: Vec<Option<Value>>) -> Self {
        values.resize(definition.fields.len(), None);
        Self { definition, values }
    }

    /// Build a record whose definition is the key set of a JSON object.
    ///
    /// Keys keep their document order; `null` values count as absent.
    pub fn from_json_object(name: impl Into<String>, object: Map<String, Value>) -> Self {
        let mut fields = Vec::with_capacity(object.len());
        let mut values = Vec::with_capacity(object.len());
        for (key, value) in object {
            fields.push(key);
            values.push(if value.is_null() { None } else { Some(value) });
        }
        Self {
            definition: Arc::new(RecordDefinition::new(name, fields)),
            values,
        }
    }

    pub fn definition(&self) -> &RecordDefinition {
        &self.definition
    }

    /// Raw value of `field`, or `None` when the field is unknown or absent.
    pub fn value(&self, field: &str) -> Option<&Value> {
        let idx = self.definition.index_of(field)?;
        self.values.get(idx)?.as_ref()
    }
}

/// Field access used by the template engine.
pub trait FieldLookup {
    /// Schema index of `name`, or `None` when the record has no such field.
    fn index_of(&self, name: &str) -> Option<usize>;

    /// String form of the field's value, or `None` when the value is absent.
    fn field_text(&self, name: &str) -> Option<String>;
}

impl FieldLookup for Record {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.definition.index_of(name)
    }

    fn field_text(&self, name: &str) -> Option<String> {
        self.value(name).map(value_text)
    }
}

/// String representation of a field value as it appears in a rendered template.
///
/// Strings are emitted without quotes; everything else uses its JSON text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
