//! Schema layer: registry access and arity-based resolution with a one-slot cache.

mod error;
pub use error::SchemaError;

pub mod registry;
pub mod resolver;

pub use registry::{InMemoryRegistry, SchemaCandidate, SchemaId, SchemaRegistry, SchemaSpec};
pub use resolver::{CachedSchema, ResolvedSchema, SchemaResolver};
