//! Delimited-text tokenizing and numeric coercion.

use serde_json::{Map, Number, Value};

/// Split a delimited payload into its value tokens.
///
/// Surrounding line terminators are dropped; tokens themselves are not trimmed.
pub fn split_tokens<'a>(body: &'a str, separator: &str) -> Vec<&'a str> {
    body.trim_matches(['\r', '\n']).split(separator).collect()
}

/// Synthesized field names `field0..fieldN-1`.
pub fn synthesized_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("field{i}")).collect()
}

/// A JSON number when the whole token is numeric, otherwise the token as a string.
///
/// Integer literals outside the `i64`/`u64` range stay strings so no digits are lost.
pub fn coerce_token(token: &str) -> Value {
    if let Ok(i) = token.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = token.parse::<u64>() {
        return Value::from(u);
    }
    if is_integer_literal(token) {
        return Value::String(token.to_string());
    }
    if is_decimal_literal(token) {
        if let Some(n) = token.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(token.to_string())
}

fn is_integer_literal(token: &str) -> bool {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Rejects spellings `f64::from_str` accepts but that are not numeric literals (`inf`, `NaN`).
fn is_decimal_literal(token: &str) -> bool {
    token.bytes().any(|b| b.is_ascii_digit())
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'+' | b'-' | b'e' | b'E'))
}

/// Pair field names with coerced tokens, in order.
pub fn zip_document<'a>(
    names: impl IntoIterator<Item = String>,
    tokens: impl IntoIterator<Item = &'a str>,
) -> Map<String, Value> {
    names
        .into_iter()
        .zip(tokens)
        .map(|(name, token)| (name, coerce_token(token)))
        .collect()
}
