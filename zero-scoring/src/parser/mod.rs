//! Structured score extraction from raw LLM responses.
//!
//! [`ResponseParser::parse`] is total: every input, however malformed, maps
//! to an [`AnalysisResult`] with a score in `[0, 1]`.
//!
//! Pipeline:
//! 1. strip `<think>` reasoning blocks (optional)
//! 2. recover a JSON object ([`unwrap`]): strict, fence-stripped, repaired, embedded
//! 3. unwrap a document nested in the rationale field ([`nested`], depth 1)
//! 4. otherwise scan the text for score mentions ([`scanner`])
//! 5. reconcile structured and mentioned scores ([`consistency`])

pub mod consistency;
pub mod nested;
pub mod normalize;
pub mod reasoning;
pub mod repair;
pub mod salvage;
pub mod scanner;
pub mod types;
pub mod unwrap;

use std::borrow::Cow;

use tracing::debug;
use zero_common::config::ScoringConfig;

pub use consistency::{ConsistencyValidator, Reconciliation, Verdict};
pub use normalize::{normalize, round_score, Scale};
pub use scanner::{MentionPattern, ScoreMention};
pub use types::{AnalysisResult, ParsedCandidate, StageOutcome, StageTag};
pub use unwrap::{unwrap_json, ParseFailure, Unwrapped};

/// Turns raw LLM text into an [`AnalysisResult`].
#[derive(Debug, Clone)]
pub struct ResponseParser {
    config: ScoringConfig,
    validator: ConsistencyValidator,
}

impl ResponseParser {
    pub fn new(config: ScoringConfig) -> Self {
        let validator = ConsistencyValidator::new(config.tolerance);
        Self { config, validator }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Parse a raw response. Never fails.
    pub fn parse(&self, raw: &str) -> AnalysisResult {
        self.parse_detailed(raw).1
    }

    /// Parse a raw response, also returning the stage the cascade stopped at
    /// (before reconciliation).
    pub fn parse_detailed(&self, raw: &str) -> (StageTag, AnalysisResult) {
        let text = if self.config.strip_reasoning && !tags_inside_document(raw) {
            reasoning::strip_reasoning(raw)
        } else {
            Cow::Borrowed(raw)
        };

        let outcome = self.classify(&text);
        let outcome_stage = outcome.stage();
        debug!(stage = %outcome_stage, "Response classified");

        let result = self.resolve(outcome);
        debug!(
            score = result.score,
            confidence_stage = %result.confidence_stage,
            "Response parsed"
        );
        (outcome_stage, result)
    }

    /// Run the stage cascade without reconciling.
    pub fn classify(&self, text: &str) -> StageOutcome {
        match unwrap_json(text) {
            Ok(Unwrapped {
                object,
                stage,
                body,
            }) => {
                match nested::resolve_nested(
                    &object,
                    &self.config.score_fields,
                    &self.config.rationale_fields,
                ) {
                    Some(inner) => StageOutcome::Nested {
                        outer: self.candidate(&object, stage),
                        inner,
                    },
                    None => StageOutcome::Decoded {
                        object,
                        stage,
                        body,
                    },
                }
            }
            Err(failure) => {
                debug!(reason = %failure, "No JSON object recovered, scanning text");
                let mentions = scanner::scan(text);
                let salvaged = salvage::truncated_rationale(text, &self.config.rationale_fields);

                if mentions.is_empty() && salvaged.is_none() {
                    StageOutcome::Failed {
                        text: text.to_string(),
                    }
                } else {
                    StageOutcome::RegexFallback {
                        mentions,
                        rationale: salvaged.unwrap_or_else(|| text.to_string()),
                    }
                }
            }
        }
    }

    fn resolve(&self, outcome: StageOutcome) -> AnalysisResult {
        match outcome {
            StageOutcome::Decoded {
                object,
                stage,
                body,
            } => {
                let candidate = self.candidate(&object, stage);
                let rationale = candidate.rationale.unwrap_or(body);
                self.reconcile(candidate.score, stage, rationale)
            }
            StageOutcome::Nested { outer, inner } => {
                // The outer rationale is the encoded payload itself
                let rationale = inner.rationale.unwrap_or_default();

                let (structured, stage) = match (outer.score, inner.score) {
                    (Some(o), Some(n)) if o != 0.0 => {
                        let r = self.validator.reconcile(Some(o), Some(n));
                        (Some(r.score), outer.source_stage)
                    }
                    (_, Some(n)) => (Some(n), StageTag::NestedUnwrap),
                    (o, None) => (o, outer.source_stage),
                };

                self.reconcile(structured, stage, rationale)
            }
            StageOutcome::RegexFallback { mentions, rationale } => {
                let mentioned = scanner::primary(&mentions).map(|m| m.value);
                let r = self.validator.reconcile(None, mentioned);
                let confidence_stage = if r.verdict == Verdict::NoSignal {
                    StageTag::Failed
                } else {
                    StageTag::RegexFallback
                };

                AnalysisResult {
                    score: r.score,
                    rationale,
                    confidence_stage,
                }
            }
            StageOutcome::Failed { text } => AnalysisResult::sentinel(text),
        }
    }

    /// Reconcile a structured score against mentions in its own rationale.
    fn reconcile(&self, structured: Option<f64>, stage: StageTag, rationale: String) -> AnalysisResult {
        let mentioned = scanner::primary(&scanner::scan(&rationale)).map(|m| m.value);
        let r = self.validator.reconcile(structured, mentioned);

        let confidence_stage = match r.verdict {
            Verdict::NoSignal => StageTag::Failed,
            _ if r.used_mention() => StageTag::RegexFallback,
            _ => stage,
        };

        AnalysisResult {
            score: r.score,
            rationale,
            confidence_stage,
        }
    }

    fn candidate(&self, object: &serde_json::Map<String, serde_json::Value>, stage: StageTag) -> ParsedCandidate {
        ParsedCandidate::from_object(
            object,
            &self.config.score_fields,
            &self.config.rationale_fields,
            stage,
        )
    }
}

/// Think tags inside a response that already decodes as a JSON object belong
/// to its string values.
fn tags_inside_document(raw: &str) -> bool {
    reasoning::has_reasoning_tags(raw)
        && matches!(
            unwrap_json(raw).map(|unwrapped| unwrapped.stage),
            Ok(StageTag::StrictJson | StageTag::CodeFenceStripped)
        )
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> AnalysisResult {
        ResponseParser::default().parse(raw)
    }

    fn assert_score(result: &AnalysisResult, expected: f64) {
        assert!(
            (result.score - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            result.score
        );
    }

    #[test]
    fn test_clean_json() {
        let result = parse(r#"{"score": 0.82, "value": "业绩稳定增长"}"#);
        assert_score(&result, 0.82);
        assert_eq!(result.rationale, "业绩稳定增长");
        assert_eq!(result.confidence_stage, StageTag::StrictJson);
    }

    #[test]
    fn test_nested_payload_with_zero_placeholder() {
        let result = parse(
            r#"{"score": 0.0, "value": "{\"score\": 0.75, \"value\": \"Good fundamentals.\"}"}"#,
        );
        assert_score(&result, 0.75);
        assert_eq!(result.rationale, "Good fundamentals.");
        assert_eq!(result.confidence_stage, StageTag::NestedUnwrap);
    }

    #[test]
    fn test_nested_payload_with_real_outer_score() {
        let result = parse(r#"{"score": 0.7, "value": "{\"score\": 0.4, \"value\": \"偏弱\"}"}"#);
        assert_score(&result, 0.7);
        assert_eq!(result.rationale, "偏弱");
        assert_eq!(result.confidence_stage, StageTag::StrictJson);
    }

    #[test]
    fn test_plain_text_mention() {
        let raw = "综合评分是85。基本面良好。";
        let result = parse(raw);
        assert_score(&result, 0.85);
        assert_eq!(result.rationale, raw);
        assert_eq!(result.confidence_stage, StageTag::RegexFallback);
    }

    #[test]
    fn test_no_signal() {
        let raw = "not json at all, no score mentioned";
        let result = parse(raw);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.rationale, raw);
        assert!(result.is_sentinel());
    }

    #[test]
    fn test_zero_score_overridden_by_rationale() {
        let result = parse(r#"{"score": 0.0, "value": "综合评分：0.65，估值合理"}"#);
        assert_score(&result, 0.65);
        assert_eq!(result.confidence_stage, StageTag::RegexFallback);
    }

    #[test]
    fn test_structured_wins_on_divergence() {
        let result = parse(r#"{"score": 0.85, "value": "综合评分：0.60"}"#);
        assert_score(&result, 0.85);
        assert_eq!(result.confidence_stage, StageTag::StrictJson);
    }

    #[test]
    fn test_truncated_json_salvaged() {
        let result = parse(r#"{"score": 0.72, "value": "公司盈利能力强，现金流充裕"#);
        assert_score(&result, 0.72);
        assert_eq!(result.rationale, "公司盈利能力强，现金流充裕");
        assert_eq!(result.confidence_stage, StageTag::RegexFallback);
    }

    #[test]
    fn test_think_block_stripped() {
        let result = parse("<think>评分应为90分吗？</think>{\"score\": 0.6, \"value\": \"一般\"}");
        assert_score(&result, 0.6);
        assert_eq!(result.rationale, "一般");
    }

    #[test]
    fn test_think_block_kept_when_disabled() {
        let config = ScoringConfig {
            strip_reasoning: false,
            ..ScoringConfig::default()
        };
        let result = ResponseParser::new(config).parse("<think>x</think>{\"score\": 0.6}");
        assert_eq!(result.confidence_stage, StageTag::EmbeddedJson);
    }

    #[test]
    fn test_missing_rationale_uses_text() {
        let raw = r#"{"score": 0.5}"#;
        let result = parse(raw);
        assert_eq!(result.rationale, raw);
    }

    #[test]
    fn test_missing_rationale_uses_fence_interior() {
        let result = parse("```json\n{\"score\": 0.5}\n```");
        assert_score(&result, 0.5);
        assert_eq!(result.rationale, r#"{"score": 0.5}"#);
        assert_eq!(result.confidence_stage, StageTag::CodeFenceStripped);
    }

    #[test]
    fn test_nested_without_inner_rationale_drops_payload() {
        let result = parse(r#"{"score":0,"value":"{\"score\": 0.65}"}"#);
        assert_score(&result, 0.65);
        assert_eq!(result.rationale, "");
        assert_eq!(result.confidence_stage, StageTag::NestedUnwrap);
    }

    #[test]
    fn test_think_tag_inside_string_value_kept() {
        let result = parse(r#"{"score": 0.7, "value": "模型先输出</think>然后给出结论"}"#);
        assert_score(&result, 0.7);
        assert_eq!(result.rationale, "模型先输出</think>然后给出结论");
        assert_eq!(result.confidence_stage, StageTag::StrictJson);
    }

    #[test]
    fn test_non_object_json_falls_back() {
        let result = parse("[0.9]");
        assert!(result.is_sentinel());
        assert_eq!(result.rationale, "[0.9]");
    }

    #[test]
    fn test_classify_outcomes() {
        let parser = ResponseParser::default();
        assert!(matches!(parser.classify(r#"{"score": 1}"#), StageOutcome::Decoded { .. }));
        assert!(matches!(
            parser.classify(r#"{"score": 0, "value": "{\"score\": 0.5}"}"#),
            StageOutcome::Nested { .. }
        ));
        assert!(matches!(parser.classify("评分是70"), StageOutcome::RegexFallback { .. }));
        assert!(matches!(parser.classify("nothing"), StageOutcome::Failed { .. }));
    }
}
