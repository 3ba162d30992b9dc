//! Bridge configuration from flat string properties.
//!
//! Properties are string key/value pairs, usually loaded from a JSON object
//! file. Required properties that are missing or invalid prevent startup; an
//! unparsable optional value is logged and its default kept.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::clock::EpochUnit;
use crate::document::ResponseFormat;
use crate::request::HttpMethod;
use crate::template::split_header_list;

/// Flat property map as supplied by the host.
pub type Properties = BTreeMap<String, String>;

pub const DEFAULT_POOL_SIZE: usize = 20;
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
pub const DEFAULT_SCHEMA_NAME: &str = "http-response";

/// Largest accepted timeout, in seconds.
const MAX_TIMEOUT_SECS: i64 = i32::MAX as i64 / 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config must be a JSON object")]
    NotAnObject,

    #[error("missing required property {0:?}")]
    Missing(&'static str),

    #[error("invalid property {key:?}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Everything the bridge needs to render, send, and normalize.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// URL template.
    pub url: String,
    pub method: HttpMethod,
    /// Raw `name:value` header specs, one per header.
    pub headers: Vec<String>,
    /// Body template, used for POST and PUT.
    pub body: Option<String>,
    pub content_type: String,
    pub response_format: ResponseFormat,
    pub field_separator: String,
    /// Per-request timeout; `None` uses the transport default.
    pub timeout: Option<Duration>,
    pub epoch_unit: EpochUnit,
    pub polling_window_secs: u64,
    pub schema_name: String,
    pub create_schema: bool,
    pub geometry_from_fields: bool,
    pub pool_size: usize,
    /// Bounded submission queue; `None` leaves it unbounded.
    pub queue_depth: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: HttpMethod::Get,
            headers: Vec::new(),
            body: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            response_format: ResponseFormat::Json,
            field_separator: ",".to_string(),
            timeout: None,
            epoch_unit: EpochUnit::Seconds,
            polling_window_secs: 0,
            schema_name: DEFAULT_SCHEMA_NAME.to_string(),
            create_schema: false,
            geometry_from_fields: false,
            pool_size: DEFAULT_POOL_SIZE,
            queue_depth: None,
        }
    }
}

impl BridgeConfig {
    /// Load a JSON object file and build the configuration from it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let props = load_properties(path)?;
        Self::from_properties(&props)
    }

    pub fn from_properties(props: &Properties) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let url = props
            .get("url")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("url"))?;

        let method = match props.get("method") {
            Some(raw) => raw
                .parse::<HttpMethod>()
                .map_err(|message| ConfigError::Invalid {
                    key: "method",
                    message,
                })?,
            None => defaults.method,
        };

        let response_format = match props.get("response_format") {
            Some(raw) => raw
                .parse::<ResponseFormat>()
                .map_err(|message| ConfigError::Invalid {
                    key: "response_format",
                    message,
                })?,
            None => defaults.response_format,
        };

        let field_separator = props
            .get("field_separator")
            .cloned()
            .unwrap_or(defaults.field_separator);
        if response_format == ResponseFormat::Csv && field_separator.is_empty() {
            return Err(ConfigError::Invalid {
                key: "field_separator",
                message: "csv responses need a non-empty separator".into(),
            });
        }

        let headers = props
            .get("headers")
            .map(|raw| split_header_list(raw))
            .unwrap_or_default();

        let body = props.get("body").cloned().filter(|b| !b.is_empty());

        let content_type = props
            .get("content_type")
            .cloned()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(defaults.content_type);

        let epoch_unit = if parse_or(props, "epoch_millis", false) {
            EpochUnit::Milliseconds
        } else {
            EpochUnit::Seconds
        };

        let pool_size = match parse_or(props, "pool_size", DEFAULT_POOL_SIZE) {
            0 => {
                error!(key = "pool_size", "pool size must be positive, keeping default");
                DEFAULT_POOL_SIZE
            }
            n => n,
        };

        let queue_depth = match props.get("queue_depth") {
            Some(_) => match parse_or::<usize>(props, "queue_depth", 0) {
                0 => None,
                n => Some(n),
            },
            None => None,
        };

        let config = Self {
            url,
            method,
            headers,
            body,
            content_type,
            response_format,
            field_separator,
            timeout: parse_timeout(props),
            epoch_unit,
            polling_window_secs: parse_or(props, "polling_window_secs", 0),
            schema_name: props
                .get("schema_name")
                .cloned()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.schema_name),
            create_schema: parse_or(props, "create_schema", false),
            geometry_from_fields: parse_or(props, "geometry_from_fields", false),
            pool_size,
            queue_depth,
        };

        info!(
            method = %config.method,
            format = %config.response_format,
            headers = config.headers.len(),
            pool_size = config.pool_size,
            "bridge configuration loaded"
        );
        Ok(config)
    }
}

/// Read a JSON object file into flat string properties.
///
/// Scalars are stringified; a `headers` array is joined with `|`.
pub fn load_properties(path: &Path) -> Result<Properties, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let Value::Object(object) = serde_json::from_str::<Value>(&text)? else {
        return Err(ConfigError::NotAnObject);
    };

    let mut props = Properties::new();
    for (key, value) in object {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Array(items) => items
                .iter()
                .map(crate::record::value_text)
                .collect::<Vec<_>>()
                .join("|"),
            other => other.to_string(),
        };
        props.insert(key, text);
    }
    Ok(props)
}

/// Parse an optional property, logging and keeping `default` on failure.
fn parse_or<T: ParseLenient>(props: &Properties, key: &'static str, default: T) -> T {
    let Some(raw) = props.get(key) else {
        return default;
    };
    match T::parse_lenient(raw.trim()) {
        Some(value) => value,
        None => {
            error!(key, value = %raw, "unparsable property, keeping default");
            default
        }
    }
}

/// Property parsing with case-insensitive booleans.
trait ParseLenient: Sized {
    fn parse_lenient(raw: &str) -> Option<Self>;
}

impl ParseLenient for bool {
    fn parse_lenient(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("true") {
            Some(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }
}

impl ParseLenient for u64 {
    fn parse_lenient(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl ParseLenient for usize {
    fn parse_lenient(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

impl ParseLenient for i64 {
    fn parse_lenient(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}

/// Whole-second timeout; 0 means the transport default.
fn parse_timeout(props: &Properties) -> Option<Duration> {
    let secs: i64 = parse_or(props, "timeout_secs", 0);
    if !(0..=MAX_TIMEOUT_SECS).contains(&secs) {
        error!(
            key = "timeout_secs",
            value = secs,
            max = MAX_TIMEOUT_SECS,
            "timeout out of range, using transport default"
        );
        return None;
    }
    match secs {
        0 => None,
        s => Some(Duration::from_secs(s as u64)),
    }
}
