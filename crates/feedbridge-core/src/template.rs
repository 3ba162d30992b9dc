//! Placeholder substitution for URL, body, and header templates.
//!
//! A template is literal text interleaved with `{name}` placeholders. Parsing
//! splits the raw string on `{` and `}`: odd-indexed pieces are placeholder
//! names, even-indexed pieces are literal text.
//!
//! # Resolution order
//!
//! 1. A field of the triggering record renders as the field's value (empty when absent).
//! 2. A special token (`$lastPollingDateTime`, `$currentDateTime`) renders as an epoch timestamp.
//! 3. Anything else is emitted unchanged as `{name}`.
//!
//! Empty placeholders (`{}`, or the gap between adjacent delimiters) render as
//! nothing and trigger no lookup.

use thiserror::Error;
use tracing::debug;

use crate::clock::{SpecialToken, TokenResolver};
use crate::record::FieldLookup;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("invalid header spec {0:?}: expected name:value")]
    InvalidHeader(String),
    #[error("header spec {0:?} has an empty name")]
    EmptyHeaderName(String),
}

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template, reusable across renders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split(['{', '}'])
            .enumerate()
            .filter(|(_, piece)| !piece.is_empty())
            .map(|(i, piece)| {
                if i % 2 == 1 {
                    Segment::Placeholder(piece.to_string())
                } else {
                    Segment::Literal(piece.to_string())
                }
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of all placeholders, in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, fields: &dyn FieldLookup, tokens: &dyn TokenResolver) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => resolve_into(&mut out, name, fields, tokens),
            }
        }
        out
    }
}

/// Append the rendered form of placeholder `name` to `out`.
///
/// A name that is neither a field nor a special token is written back with
/// its braces (`{name}`), not as the bare name, so the gap stays visible in
/// the outgoing request.
fn resolve_into(
    out: &mut String,
    name: &str,
    fields: &dyn FieldLookup,
    tokens: &dyn TokenResolver,
) {
    if fields.index_of(name).is_some() {
        if let Some(text) = fields.field_text(name) {
            out.push_str(&text);
        }
    } else if let Some(token) = SpecialToken::parse(name) {
        out.push_str(&tokens.resolve(token).to_string());
    } else {
        debug!(placeholder = name, "unresolved placeholder passed through");
        out.push('{');
        out.push_str(name);
        out.push('}');
    }
}

/// Parse and render `template` in one step.
pub fn render(template: &str, fields: &dyn FieldLookup, tokens: &dyn TokenResolver) -> String {
    Template::parse(template).render(fields, tokens)
}

/// A `name:value` header spec with each side templated independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTemplate {
    raw: String,
    name: Template,
    value: Template,
}

impl HeaderTemplate {
    /// Split `spec` on its first `:`. The value may itself contain colons.
    pub fn parse(spec: &str) -> Result<Self, TemplateError> {
        let (name, value) = spec
            .split_once(':')
            .ok_or_else(|| TemplateError::InvalidHeader(spec.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(TemplateError::EmptyHeaderName(spec.to_string()));
        }
        Ok(Self {
            raw: spec.to_string(),
            name: Template::parse(name),
            value: Template::parse(value.trim()),
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Placeholder names referenced by the name side, then the value side.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.name.placeholders().chain(self.value.placeholders())
    }

    /// Render both sides. A name that renders empty, e.g. from an absent
    /// field, is rejected so the caller can leave the header out.
    pub fn render(
        &self,
        fields: &dyn FieldLookup,
        tokens: &dyn TokenResolver,
    ) -> Result<(String, String), TemplateError> {
        let name = self.name.render(fields, tokens);
        if name.trim().is_empty() {
            return Err(TemplateError::EmptyHeaderName(self.raw.clone()));
        }
        Ok((name, self.value.render(fields, tokens)))
    }
}

/// Split a pipe-separated header list (`a:1|b:2`) into individual specs.
pub fn split_header_list(raw: &str) -> Vec<String> {
    raw.split('|')
        .filter(|spec| !spec.trim().is_empty())
        .map(str::to_string)
        .collect()
}
