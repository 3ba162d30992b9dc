//! Response payload normalization into canonical documents.

use std::sync::Arc;

use feedbridge_core::{BridgeConfig, CanonicalDocument, ResponseFormat};
use feedbridge_schema::SchemaResolver;
use serde_json::Value;
use tracing::{debug, warn};

use crate::NormalizeError;
use crate::delimited::{split_tokens, synthesized_names, zip_document};
use crate::xml::xml_to_value;

/// Where delimited-text field names come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    /// Synthesize `field0..fieldN-1`.
    Create,
    /// Resolve a registry schema by name and value count.
    Reuse,
}

/// Settings for delimited-text payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedOptions {
    pub separator: String,
    pub mode: SchemaMode,
    pub schema_name: String,
    /// Registry schemas carry one extra, synthesized geometry field.
    pub geometry_from_fields: bool,
}

impl DelimitedOptions {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            separator: config.field_separator.clone(),
            mode: if config.create_schema {
                SchemaMode::Create
            } else {
                SchemaMode::Reuse
            },
            schema_name: config.schema_name.clone(),
            geometry_from_fields: config.geometry_from_fields,
        }
    }
}

/// Converts raw response bodies into [`CanonicalDocument`]s.
pub struct ResponseNormalizer {
    delimited: DelimitedOptions,
    resolver: Arc<SchemaResolver>,
}

impl ResponseNormalizer {
    pub fn new(delimited: DelimitedOptions, resolver: Arc<SchemaResolver>) -> Self {
        Self {
            delimited,
            resolver,
        }
    }

    pub fn resolver(&self) -> &Arc<SchemaResolver> {
        &self.resolver
    }

    pub fn normalize(
        &self,
        body: &str,
        format: ResponseFormat,
    ) -> Result<CanonicalDocument, NormalizeError> {
        let doc = match format {
            ResponseFormat::Json => CanonicalDocument::new(serde_json::from_str::<Value>(body)?),
            ResponseFormat::Xml => CanonicalDocument::new(xml_to_value(body)?),
            ResponseFormat::Csv => self.normalize_delimited(body)?,
        };
        debug!(format = %format, document = %doc, "normalized response");
        Ok(doc)
    }

    fn normalize_delimited(&self, body: &str) -> Result<CanonicalDocument, NormalizeError> {
        if body.trim().is_empty() {
            return Err(NormalizeError::Empty);
        }
        let opts = &self.delimited;
        let tokens = split_tokens(body, &opts.separator);

        let names = match opts.mode {
            SchemaMode::Create => {
                let names = synthesized_names(tokens.len());
                // The document does not depend on the registry; a failure here is only logged.
                if let Err(e) = self.resolver.ensure_created(&opts.schema_name, names.clone()) {
                    warn!(schema = %opts.schema_name, error = %e, "could not register synthesized schema");
                }
                names
            }
            SchemaMode::Reuse => {
                let desired = tokens.len() + usize::from(opts.geometry_from_fields);
                let schema = self.resolver.resolve(desired, &opts.schema_name)?;
                if schema.fields.len() < tokens.len() {
                    return Err(NormalizeError::ArityMismatch {
                        schema: opts.schema_name.clone(),
                        fields: schema.fields.len(),
                        values: tokens.len(),
                    });
                }
                schema.fields
            }
        };

        Ok(CanonicalDocument::from_map(zip_document(names, tokens)))
    }
}
