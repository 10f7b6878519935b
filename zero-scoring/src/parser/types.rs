//! Types shared by the response parsing pipeline.
//!
//! A raw LLM response moves through a fixed cascade of stages. Each stage
//! produces a [`StageOutcome`], which is turned into one or more
//! [`ParsedCandidate`]s and finally reconciled into an [`AnalysisResult`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::scanner::ScoreMention;

/// The pipeline stage that produced a candidate or a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageTag {
    /// The response decoded as JSON without modification
    StrictJson,
    /// The response decoded after removing a surrounding code fence
    CodeFenceStripped,
    /// The response decoded after the escape/quote repair pass
    RepairedJson,
    /// A JSON object embedded in surrounding prose was decoded
    EmbeddedJson,
    /// The score came from a JSON document nested inside the rationale field
    NestedUnwrap,
    /// The score came from a textual mention ("评分是85", "score: 0.7")
    RegexFallback,
    /// No usable score was found
    Failed,
}

impl std::fmt::Display for StageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StrictJson => "strict-json",
            Self::CodeFenceStripped => "code-fence-stripped",
            Self::RepairedJson => "repaired-json",
            Self::EmbeddedJson => "embedded-json",
            Self::NestedUnwrap => "nested-unwrap",
            Self::RegexFallback => "regex-fallback",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Intermediate score/rationale pair produced by one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCandidate {
    /// Raw structured score (not yet normalized)
    pub score: Option<f64>,
    /// Rationale text
    pub rationale: Option<String>,
    /// Stage that produced this candidate
    pub source_stage: StageTag,
}

impl ParsedCandidate {
    /// Build a candidate from a decoded JSON object using the configured field aliases.
    pub fn from_object(
        object: &Map<String, Value>,
        score_fields: &[String],
        rationale_fields: &[String],
        source_stage: StageTag,
    ) -> Self {
        let score = first_field(object, score_fields).and_then(score_from_value);
        let rationale = first_field(object, rationale_fields).map(rationale_from_value);

        Self {
            score,
            rationale,
            source_stage,
        }
    }
}

/// Result of running one response through the stage cascade.
///
/// Each variant carries only the data that stage can legitimately produce.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// A JSON object was decoded (strict, fence-stripped, repaired or embedded)
    Decoded {
        object: Map<String, Value>,
        stage: StageTag,
        /// Decoded span, used as rationale when the object carries none
        body: String,
    },
    /// A JSON object was decoded and its rationale field held another object
    Nested {
        outer: ParsedCandidate,
        inner: ParsedCandidate,
    },
    /// No JSON could be decoded, but the text mentions a score or a salvageable rationale
    RegexFallback {
        mentions: Vec<ScoreMention>,
        rationale: String,
    },
    /// Nothing usable was recovered
    Failed { text: String },
}

impl StageOutcome {
    /// Stage tag describing this outcome.
    pub fn stage(&self) -> StageTag {
        match self {
            Self::Decoded { stage, .. } => *stage,
            Self::Nested { .. } => StageTag::NestedUnwrap,
            Self::RegexFallback { .. } => StageTag::RegexFallback,
            Self::Failed { .. } => StageTag::Failed,
        }
    }
}

/// Final, always-bounded result of analysing one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Confidence score in `[0, 1]`; `0.0` means no usable signal
    pub score: f64,
    /// Reconciled, unwrapped rationale text
    pub rationale: String,
    /// Stage the final score came from
    pub confidence_stage: StageTag,
}

impl AnalysisResult {
    /// The "no usable signal" result.
    pub fn sentinel(rationale: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            rationale: rationale.into(),
            confidence_stage: StageTag::Failed,
        }
    }

    /// Whether this result carries no usable signal.
    pub fn is_sentinel(&self) -> bool {
        self.confidence_stage == StageTag::Failed
    }
}

fn first_field<'a>(object: &'a Map<String, Value>, names: &[String]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| object.get(name))
        .filter(|value| !value.is_null())
}

/// Read a score from a JSON value.
///
/// Accepts numbers and numeric strings such as `"0.75"` or `"85%"`.
pub fn score_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
            trimmed.parse::<f64>().ok()
        }
        _ => None,
    }
    .filter(|score| score.is_finite())
}

/// Read rationale text from a JSON value; non-strings are serialised.
pub fn rationale_from_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_stage_tag_display() {
        assert_eq!(StageTag::StrictJson.to_string(), "strict-json");
        assert_eq!(StageTag::NestedUnwrap.to_string(), "nested-unwrap");
        assert_eq!(StageTag::RegexFallback.to_string(), "regex-fallback");
    }

    #[test]
    fn test_stage_tag_serialization() {
        let json = serde_json::to_string(&StageTag::CodeFenceStripped).unwrap();
        assert_eq!(json, "\"code-fence-stripped\"");
    }

    #[test]
    fn test_candidate_from_object_aliases() {
        let object = json!({"sentiment_score": 0.8, "analysis_summary": "舆情偏正面"});
        let candidate = ParsedCandidate::from_object(
            object.as_object().unwrap(),
            &fields(&["score", "sentiment_score"]),
            &fields(&["value", "analysis_summary"]),
            StageTag::StrictJson,
        );

        assert_eq!(candidate.score, Some(0.8));
        assert_eq!(candidate.rationale.as_deref(), Some("舆情偏正面"));
    }

    #[test]
    fn test_candidate_null_fields_are_absent() {
        let object = json!({"score": null, "value": null, "analysis": "text"});
        let candidate = ParsedCandidate::from_object(
            object.as_object().unwrap(),
            &fields(&["score"]),
            &fields(&["value", "analysis"]),
            StageTag::StrictJson,
        );

        assert_eq!(candidate.score, None);
        assert_eq!(candidate.rationale, None);
    }

    #[test]
    fn test_score_from_value() {
        assert_eq!(score_from_value(&json!(0.65)), Some(0.65));
        assert_eq!(score_from_value(&json!(85)), Some(85.0));
        assert_eq!(score_from_value(&json!("0.75")), Some(0.75));
        assert_eq!(score_from_value(&json!(" 85% ")), Some(85.0));
        assert_eq!(score_from_value(&json!("high")), None);
        assert_eq!(score_from_value(&json!("NaN")), None);
        assert_eq!(score_from_value(&json!(true)), None);
    }

    #[test]
    fn test_rationale_from_value() {
        assert_eq!(rationale_from_value(&json!("text")), "text");
        assert_eq!(rationale_from_value(&json!(["a", "b"])), r#"["a","b"]"#);
    }

    #[test]
    fn test_sentinel() {
        let result = AnalysisResult::sentinel("LLM分析失败: 请求超时");
        assert_eq!(result.score, 0.0);
        assert!(result.is_sentinel());
    }
}
