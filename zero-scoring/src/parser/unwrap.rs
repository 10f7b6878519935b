//! Recover a JSON object from a raw LLM response.
//!
//! Stages run in order and the first success wins:
//! 1. strict decode (after removing a surrounding code fence, if any)
//! 2. decode after the repair pass
//! 3. decode an object embedded in surrounding prose
//!
//! A decoded value that is not an object is a failure; callers fall back to
//! text scanning.

use serde_json::{Map, Value};
use thiserror::Error;

use super::repair::repair_json;
use super::types::StageTag;

/// Why no JSON object could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("empty response")]
    Empty,

    #[error("decoded JSON is a {0}, not an object")]
    NotAnObject(&'static str),

    #[error("invalid JSON: {0}")]
    Invalid(String),
}

/// A JSON object and the stage that decoded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Unwrapped {
    pub object: Map<String, Value>,
    pub stage: StageTag,
    /// The span the object was decoded from, before repair and without any fence
    pub body: String,
}

/// Run the decode cascade over `text`.
pub fn unwrap_json(text: &str) -> Result<Unwrapped, ParseFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseFailure::Empty);
    }

    let (body, strict_stage) = match strip_code_fence(trimmed) {
        Some(inner) => (inner, StageTag::CodeFenceStripped),
        None => (trimmed, StageTag::StrictJson),
    };

    let first_error = match decode_object(body) {
        Ok(object) => {
            return Ok(Unwrapped {
                object,
                stage: strict_stage,
                body: body.to_string(),
            })
        }
        Err(e) => e,
    };

    // A well-formed scalar or array is not something repair can fix
    if matches!(first_error, ParseFailure::NotAnObject(_)) {
        return Err(first_error);
    }

    let repaired = repair_json(body);
    if repaired != body {
        if let Ok(object) = decode_object(&repaired) {
            return Ok(Unwrapped {
                object,
                stage: StageTag::RepairedJson,
                body: body.to_string(),
            });
        }
    }

    if let Some(embedded) = find_embedded_object(trimmed).filter(|e| *e != body) {
        let decoded = decode_object(embedded).or_else(|_| decode_object(&repair_json(embedded)));
        if let Ok(object) = decoded {
            return Ok(Unwrapped {
                object,
                stage: StageTag::EmbeddedJson,
                body: embedded.to_string(),
            });
        }
    }

    Err(first_error)
}

fn decode_object(text: &str) -> Result<Map<String, Value>, ParseFailure> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(ParseFailure::NotAnObject(json_kind(&other))),
        Err(e) => Err(ParseFailure::Invalid(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Strip a surrounding markdown code fence.
///
/// Only applies when the text both starts and ends with a fence; the
/// opening fence may carry a language tag such as `json`.
pub fn strip_code_fence(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("```")?.strip_suffix("```")?;

    let inner = match inner.find('\n') {
        Some(pos) if inner[..pos].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &inner[pos + 1..]
        }
        _ => inner
            .strip_prefix("json")
            .or_else(|| inner.strip_prefix("JSON"))
            .unwrap_or(inner),
    };

    Some(inner.trim())
}

/// Locate a JSON object inside prose.
///
/// Prefers a ```json fenced block anywhere in the text, then the first
/// balanced `{...}` span. Brace matching ignores braces inside strings.
pub fn find_embedded_object(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let after = &text[start + 7..];
        if let Some(end) = after.find("```") {
            let block = after[..end].trim();
            if !block.is_empty() {
                return Some(block);
            }
        }
    }

    balanced_object(text)
}

fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
