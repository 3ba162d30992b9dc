use thiserror::Error;

use crate::registry::SchemaId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema {0:?} does not exist")]
    NotFound(String),

    #[error("schema id {0} is not in the registry")]
    UnknownId(SchemaId),

    #[error("schema {name:?} must have at least one field")]
    NoFields { name: String },

    #[error("schema resolver is closed; created schemas were already purged")]
    Closed,

    #[error("registry error: {0}")]
    Registry(String),
}
