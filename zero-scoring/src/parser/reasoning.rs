//! Removal of `<think>` reasoning blocks emitted by reasoning models.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_BLOCK: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>").ok());

/// Leading reasoning whose opening tag was cut off. Text holding a `{` before
/// the tag may be a JSON document carrying the tag in a string.
static STRAY_CLOSE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)^[^{]*?</think>").ok());

static TRAILING_CLOSE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)</think>\s*\z").ok());

/// An opening tag that is never closed runs to the next blank line.
static UNTERMINATED: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?(?:\n[ \t]*\n|\z)").ok());

/// Strip reasoning blocks from a response.
///
/// Borrows the input unchanged when it contains no think tags.
pub fn strip_reasoning(text: &str) -> Cow<'_, str> {
    if !has_reasoning_tags(text) {
        return Cow::Borrowed(text);
    }

    let patterns: [&Option<Regex>; 4] = [&THINK_BLOCK, &STRAY_CLOSE, &TRAILING_CLOSE, &UNTERMINATED];

    let mut cleaned = text.to_string();
    for pattern in patterns {
        if let Some(regex) = pattern {
            cleaned = regex.replace_all(&cleaned, "").into_owned();
        }
    }

    let cleaned = cleaned.trim();
    if cleaned == text {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(cleaned.to_string())
    }
}

/// Whether `text` contains an opening or closing think tag.
pub fn has_reasoning_tags(text: &str) -> bool {
    text.to_ascii_lowercase().contains("think>")
}
