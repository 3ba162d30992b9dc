//! Response normalization: JSON validation, XML and delimited text to canonical documents.

mod error;
pub use error::NormalizeError;

pub mod delimited;
pub mod normalizer;
pub mod xml;

pub use normalizer::{DelimitedOptions, ResponseNormalizer, SchemaMode};
