//! Utility functions for Zero services.

use once_cell::sync::Lazy;
use regex::Regex;

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// This function safely handles multi-byte UTF-8 characters (emoji, CJK, accented characters)
/// by using character boundaries instead of byte indices.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

static SECRET_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)(api[_-]?key|apikey|key)=[^&\s]{8,}", "$1=***REDACTED***"),
        (r"(?i)(token|secret|bearer)\s*[=:]?\s*[A-Za-z0-9._\-]{10,}", "$1 ***REDACTED***"),
        (r"sk-[a-zA-Z0-9]{20,}", "***REDACTED_API_KEY***"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Sanitize a string for safe logging (redact sensitive patterns).
pub fn sanitize_for_log(s: &str) -> String {
    let mut result = s.to_string();
    for (re, replacement) in SECRET_PATTERNS.iter() {
        result = re.replace_all(&result, *replacement).to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
    }

    #[test]
    fn test_truncate_cjk() {
        assert_eq!(truncate_with_ellipsis("综合评分是85。基本面良好。", 5), "综合评分是...");
    }

    #[test]
    fn test_sanitize_query_key() {
        let url = "https://generativelanguage.googleapis.com/v1/models/gemini:generateContent?key=AIzaSyExampleKey123";
        let sanitized = sanitize_for_log(url);
        assert!(!sanitized.contains("AIzaSyExampleKey123"));
        assert!(sanitized.contains("REDACTED"));
    }

    #[test]
    fn test_sanitize_openai_key() {
        let sanitized = sanitize_for_log("invalid key sk-abcdefghijklmnopqrstuvwxyz");
        assert!(!sanitized.contains("sk-abcdefghijklmnopqrstuvwxyz"));
    }
}
