//! Depth-1 resolution of JSON documents nested in the rationale field.
//!
//! Some models answer with `{"score": 0.0, "value": "{\"score\": 0.75, ...}"}`:
//! the real payload is JSON-encoded again inside the rationale string. This
//! module decodes that inner document once. Anything nested deeper is left as
//! text.

use serde_json::{Map, Value};

use super::types::{ParsedCandidate, StageTag};
use super::unwrap::unwrap_json;

/// Decode the inner document held by the first rationale field, if any.
///
/// Returns `None` unless the inner document is an object carrying a score
/// and/or rationale field of its own.
pub fn resolve_nested(
    outer: &Map<String, Value>,
    score_fields: &[String],
    rationale_fields: &[String],
) -> Option<ParsedCandidate> {
    let field = rationale_fields
        .iter()
        .find_map(|name| outer.get(name))
        .filter(|value| !value.is_null())?;

    let inner = match field {
        Value::Object(object) => object.clone(),
        Value::String(text) if looks_like_object(text) => unwrap_json(text).ok()?.object,
        _ => return None,
    };

    let candidate =
        ParsedCandidate::from_object(&inner, score_fields, rationale_fields, StageTag::NestedUnwrap);

    (candidate.score.is_some() || candidate.rationale.is_some()).then_some(candidate)
}

fn looks_like_object(text: &str) -> bool {
    let trimmed = text.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with("```") && trimmed.ends_with("```"))
}
