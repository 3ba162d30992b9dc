use feedbridge_schema::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed XML payload: {0}")]
    Xml(String),

    #[error("empty payload")]
    Empty,

    #[error("no matching schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("schema {schema:?} has {fields} fields but the payload has {values} values")]
    ArityMismatch {
        schema: String,
        fields: usize,
        values: usize,
    },
}
