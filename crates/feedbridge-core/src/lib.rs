//! Core types for feedbridge: records, time tokens, templates, rendered requests, configuration.

pub mod clock;
pub mod config;
pub mod document;
pub mod record;
pub mod request;
pub mod template;

pub use clock::{
    Clock, EpochUnit, FixedClock, PollingClock, SpecialToken, SystemClock, TimeTokens,
    TokenResolver,
};
pub use config::{BridgeConfig, ConfigError, Properties};
pub use document::{CanonicalDocument, ResponseFormat};
pub use record::{FieldLookup, Record, RecordDefinition};
pub use request::{HttpMethod, RenderedRequest};
pub use template::{HeaderTemplate, Template, TemplateError, render};
