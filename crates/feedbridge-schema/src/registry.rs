//! Schema registry interface and an in-memory implementation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::Deserialize;
use tracing::{debug, info};

use crate::SchemaError;

/// Registry identifier of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaId(pub String);

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A named schema as stored in the registry. Never mutated by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCandidate {
    pub id: SchemaId,
    pub name: String,
    pub fields: Vec<String>,
}

impl SchemaCandidate {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Lookup/creation service for named schemas.
///
/// Implementations must be safe to call from concurrent workers.
pub trait SchemaRegistry: Send + Sync {
    /// All schemas called `name`, in registry order.
    fn search_by_name(&self, name: &str) -> Result<Vec<SchemaCandidate>, SchemaError>;

    fn get(&self, id: &SchemaId) -> Result<Option<SchemaCandidate>, SchemaError>;

    fn create(&self, name: &str, fields: Vec<String>) -> Result<SchemaCandidate, SchemaError>;

    fn delete(&self, id: &SchemaId) -> Result<(), SchemaError>;
}

/// Schema declaration used to seed a registry, e.g. from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaSpec {
    pub name: String,
    pub fields: Vec<String>,
}

/// Process-local registry keeping schemas in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    schemas: RwLock<Vec<SchemaCandidate>>,
    next_id: AtomicU64,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: impl IntoIterator<Item = SchemaSpec>) -> Result<Self, SchemaError> {
        let registry = Self::new();
        for spec in specs {
            registry.create(&spec.name, spec.fields)?;
        }
        info!(count = registry.len(), "schema registry seeded");
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SchemaRegistry for InMemoryRegistry {
    fn search_by_name(&self, name: &str) -> Result<Vec<SchemaCandidate>, SchemaError> {
        let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
        Ok(schemas.iter().filter(|s| s.name == name).cloned().collect())
    }

    fn get(&self, id: &SchemaId) -> Result<Option<SchemaCandidate>, SchemaError> {
        let schemas = self.schemas.read().unwrap_or_else(PoisonError::into_inner);
        Ok(schemas.iter().find(|s| &s.id == id).cloned())
    }

    fn create(&self, name: &str, fields: Vec<String>) -> Result<SchemaCandidate, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::NoFields {
                name: name.to_string(),
            });
        }
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let candidate = SchemaCandidate {
            id: SchemaId(format!("schema-{seq}")),
            name: name.to_string(),
            fields,
        };
        debug!(id = %candidate.id, name, fields = candidate.field_count(), "schema created");
        self.schemas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(candidate.clone());
        Ok(candidate)
    }

    fn delete(&self, id: &SchemaId) -> Result<(), SchemaError> {
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        let idx = schemas
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| SchemaError::UnknownId(id.clone()))?;
        schemas.remove(idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn search_keeps_insertion_order() {
        let reg = InMemoryRegistry::new();
        let a = reg.create("feed", fields(&["x"])).unwrap();
        reg.create("other", fields(&["y"])).unwrap();
        let b = reg.create("feed", fields(&["x", "y"])).unwrap();

        let found = reg.search_by_name("feed").unwrap();
        assert_eq!(found, vec![a, b]);
        assert!(reg.search_by_name("none").unwrap().is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let reg = InMemoryRegistry::new();
        let a = reg.create("feed", fields(&["x"])).unwrap();
        let b = reg.create("feed", fields(&["x"])).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn get_and_delete() {
        let reg = InMemoryRegistry::new();
        let a = reg.create("feed", fields(&["x"])).unwrap();
        assert_eq!(reg.get(&a.id).unwrap().as_ref(), Some(&a));

        reg.delete(&a.id).unwrap();
        assert!(reg.get(&a.id).unwrap().is_none());
        assert_eq!(
            reg.delete(&a.id),
            Err(SchemaError::UnknownId(a.id.clone()))
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn create_requires_fields() {
        let reg = InMemoryRegistry::new();
        assert!(matches!(
            reg.create("feed", vec![]),
            Err(SchemaError::NoFields { .. })
        ));
    }

    #[test]
    fn seed_from_json_specs() {
        let specs: Vec<SchemaSpec> = serde_json::from_str(
            r#"[{"name": "feed", "fields": ["a", "b"]}, {"name": "feed", "fields": ["a"]}]"#,
        )
        .unwrap();
        let reg = InMemoryRegistry::from_specs(specs).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.search_by_name("feed").unwrap()[0].field_count(), 2);
    }
}
