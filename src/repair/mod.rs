//! Schema validation and repair for model output.
//!
//! Every model response is untrusted input: free text that usually, but not
//! always, contains the JSON the prompt asked for. This module recovers a
//! structured value in escalating steps: strict parse, then extraction of
//! the first balanced JSON region from surrounding prose, then field-level
//! coercion of near-miss types (numeric strings, currency strings, a single
//! string where a list was expected). A missing required field is always an
//! error, never a default: defaults would mask model misbehavior from the
//! budget and leftovers logic that depends on real ingredient data.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Failure to conform model output to an expected schema.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    /// No JSON value could be recovered from the text at all.
    #[error("no JSON found in model output")]
    NoJson { raw: String },

    /// A required field is absent.
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    /// A field is present but unusable even after coercion.
    #[error("invalid field `{field}`: {message}")]
    Invalid { field: String, message: String },
}

impl ParseError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Extract a JSON value from free-form model output.
pub fn extract_json(raw: &str) -> Result<Value, ParseError> {
    let trimmed = strip_fences(raw.trim());

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(region) = balanced_region(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(region) {
            return Ok(value);
        }
    }

    Err(ParseError::NoJson {
        raw: raw.to_string(),
    })
}

/// Strip a Markdown code fence if the whole text is wrapped in one.
fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    text
}

/// Find the first balanced `{...}` or `[...]` region, honoring JSON string
/// escapes so braces inside strings do not terminate the scan.
fn balanced_region(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find(|c| c == '{' || c == '[')?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Require that a value is a JSON object.
pub fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ParseError> {
    value
        .as_object()
        .ok_or_else(|| ParseError::invalid(what, "expected a JSON object"))
}

/// Required non-empty string field.
pub fn str_field(obj: &Map<String, Value>, field: &str) -> Result<String, ParseError> {
    let value = obj.get(field).ok_or_else(|| ParseError::missing(field))?;
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(ParseError::invalid(field, "expected a string")),
    };
    if s.is_empty() {
        return Err(ParseError::invalid(field, "must not be empty"));
    }
    Ok(s)
}

/// Required numeric field; coerces numeric and currency-formatted strings.
pub fn f64_field(obj: &Map<String, Value>, field: &str) -> Result<f64, ParseError> {
    let value = obj.get(field).ok_or_else(|| ParseError::missing(field))?;
    coerce_number(value).ok_or_else(|| ParseError::invalid(field, "expected a number"))
}

/// Required positive-integer field.
pub fn u32_field(obj: &Map<String, Value>, field: &str) -> Result<u32, ParseError> {
    let n = f64_field(obj, field)?;
    if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(ParseError::invalid(field, "expected a non-negative integer"));
    }
    Ok(n as u32)
}

/// Optional money field: absent or null is `None`, present but unusable is
/// an error rather than a silent drop.
pub fn opt_money_field(obj: &Map<String, Value>, field: &str) -> Result<Option<f64>, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => coerce_number(value)
            .map(Some)
            .ok_or_else(|| ParseError::invalid(field, "expected a monetary value")),
    }
}

/// Required boolean field; coerces "true"/"false"/"yes"/"no" strings.
pub fn bool_field(obj: &Map<String, Value>, field: &str) -> Result<bool, ParseError> {
    let value = obj.get(field).ok_or_else(|| ParseError::missing(field))?;
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(true),
            "false" | "no" => Ok(false),
            _ => Err(ParseError::invalid(field, "expected a boolean")),
        },
        _ => Err(ParseError::invalid(field, "expected a boolean")),
    }
}

/// Required list of strings; a bare string coerces to a one-element list.
pub fn string_list(obj: &Map<String, Value>, field: &str) -> Result<Vec<String>, ParseError> {
    let value = obj.get(field).ok_or_else(|| ParseError::missing(field))?;
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Ok(other.to_string()),
            })
            .collect(),
        Value::String(s) => Ok(vec![s.trim().to_string()]),
        _ => Err(ParseError::invalid(field, "expected a list of strings")),
    }
}

/// Required array field.
pub fn array_field<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Vec<Value>, ParseError> {
    obj.get(field)
        .ok_or_else(|| ParseError::missing(field))?
        .as_array()
        .ok_or_else(|| ParseError::invalid(field, "expected an array"))
}

/// Coerce a JSON value to a number, accepting numeric strings and
/// currency-formatted strings like "$3.50" or "1,200".
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_money(s),
        _ => None,
    }
}

/// Pull the first number out of a currency-ish string.
pub fn parse_money(text: &str) -> Option<f64> {
    static MONEY: OnceLock<Regex> = OnceLock::new();
    let re = MONEY.get_or_init(|| Regex::new(r"-?\d+(?:,\d{3})*(?:\.\d+)?").expect("money regex"));
    let m = re.find(text)?;
    m.as_str().replace(',', "").parse().ok()
}
