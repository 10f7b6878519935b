//! Rationale salvage from truncated JSON.
//!
//! When a response is cut off by the token limit the document never closes,
//! but the rationale string up to the cut is still worth keeping.

use regex::Regex;

/// Extract the (possibly unterminated) string value of the first rationale
/// field found in `text`.
pub fn truncated_rationale(text: &str, rationale_fields: &[String]) -> Option<String> {
    rationale_fields.iter().find_map(|field| {
        let pattern = format!(r#""{}"\s*:\s*""#, regex::escape(field));
        let regex = Regex::new(&pattern).ok()?;
        let start = regex.find(text)?.end();
        let value = read_string_body(&text[start..]);
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Unescape a JSON string body up to its closing quote or the end of input.
fn read_string_body(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    if let Some(decoded) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        out.push(decoded);
                    }
                }
                Some(other) => out.push(other),
                None => break,
            },
            c => out.push(c),
        }
    }

    out
}
