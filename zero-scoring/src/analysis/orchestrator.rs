//! Single-subject analysis: LLM call, then parse, then reconcile.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zero_common::Config;

use crate::llm::{HttpLlmClient, LlmClient, Prompt};
use crate::parser::{AnalysisResult, ResponseParser, StageTag};

/// Prefix of the rationale recorded when the LLM call itself failed.
pub const FAILURE_RATIONALE_PREFIX: &str = "LLM分析失败";

/// One subject to analyse with one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Subject identifier (e.g., stock code)
    pub subject: String,
    /// Strategy name, used as the persistence key together with `subject`
    pub strategy: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl AnalysisRequest {
    pub fn new(
        subject: impl Into<String>,
        strategy: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            strategy: strategy.into(),
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }

    pub fn prompt(&self) -> Prompt {
        Prompt::new(self.system_prompt.clone(), self.user_prompt.clone())
    }
}

/// Orchestrator states, reported at `debug!` as a trace of where a response
/// went. Parsing runs as one cascade, so the states record its path after the
/// fact and do not drive it. `Done` is reachable from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Requesting,
    ParsingStrict,
    ParsingRepaired,
    ParsingNested,
    ScanningText,
    Reconciling,
    Done,
}

impl AnalysisState {
    /// Trace of the states passed through for a response whose cascade
    /// stopped at `stage`.
    pub fn trail(stage: StageTag) -> Vec<AnalysisState> {
        use AnalysisState::*;

        let parsing: &[AnalysisState] = match stage {
            StageTag::StrictJson | StageTag::CodeFenceStripped => &[ParsingStrict],
            StageTag::RepairedJson | StageTag::EmbeddedJson => &[ParsingStrict, ParsingRepaired],
            StageTag::NestedUnwrap => &[ParsingStrict, ParsingNested],
            StageTag::RegexFallback | StageTag::Failed => {
                &[ParsingStrict, ParsingRepaired, ScanningText]
            }
        };

        let mut trail = Vec::with_capacity(parsing.len() + 3);
        trail.push(Requesting);
        trail.extend_from_slice(parsing);
        trail.push(Reconciling);
        trail.push(Done);
        trail
    }
}

/// Runs one request end to end. Never fails.
pub struct AnalysisOrchestrator {
    client: Arc<dyn LlmClient>,
    parser: ResponseParser,
}

impl AnalysisOrchestrator {
    pub fn new(client: Arc<dyn LlmClient>, parser: ResponseParser) -> Self {
        Self { client, parser }
    }

    /// Build an orchestrator with the HTTP client described by `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(HttpLlmClient::new(config.llm.clone())),
            ResponseParser::new(config.scoring.clone()),
        )
    }

    pub fn parser(&self) -> &ResponseParser {
        &self.parser
    }

    /// Analyse one request.
    ///
    /// Transport failures produce the zero-score sentinel with the failure
    /// reason as rationale.
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult {
        trace_state(request, AnalysisState::Requesting);

        let raw = match self.client.complete(&request.prompt()).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    subject = %request.subject,
                    strategy = %request.strategy,
                    provider = %self.client.name(),
                    error = %e,
                    "LLM analysis failed, recording zero score"
                );
                trace_state(request, AnalysisState::Done);
                return AnalysisResult::sentinel(format!("{}: {}", FAILURE_RATIONALE_PREFIX, e));
            }
        };

        let (outcome_stage, result) = self.parser.parse_detailed(&raw);
        for state in AnalysisState::trail(outcome_stage).into_iter().skip(1) {
            trace_state(request, state);
        }

        info!(
            subject = %request.subject,
            strategy = %request.strategy,
            score = result.score,
            stage = %result.confidence_stage,
            "Analysis complete"
        );

        result
    }
}

fn trace_state(request: &AnalysisRequest, state: AnalysisState) {
    debug!(
        subject = %request.subject,
        strategy = %request.strategy,
        state = ?state,
        "Analysis state"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a fixed outcome and records the prompts it saw.
    struct StubClient {
        reply: fn() -> Result<String, LlmError>,
        seen: Mutex<Vec<Prompt>>,
    }

    impl StubClient {
        fn new(reply: fn() -> Result<String, LlmError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for StubClient {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(prompt.clone());
            (self.reply)()
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("600519", "llm_fundamental", "你是分析师", "分析贵州茅台")
    }

    #[tokio::test]
    async fn test_analyze_parses_response() {
        let client = StubClient::new(|| Ok(r#"{"score": 0.82, "value": "业绩稳定增长"}"#.to_string()));
        let orchestrator = AnalysisOrchestrator::new(client.clone(), ResponseParser::default());

        let result = orchestrator.analyze(&request()).await;
        assert_eq!(result.score, 0.82);
        assert_eq!(result.rationale, "业绩稳定增长");
        assert_eq!(result.confidence_stage, StageTag::StrictJson);

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[Prompt::new("你是分析师", "分析贵州茅台")]);
    }

    #[tokio::test]
    async fn test_transport_failure_yields_sentinel() {
        let client = StubClient::new(|| Err(LlmError::Timeout(30)));
        let orchestrator = AnalysisOrchestrator::new(client, ResponseParser::default());

        let result = orchestrator.analyze(&request()).await;
        assert_eq!(result.score, 0.0);
        assert!(result.is_sentinel());
        assert_eq!(result.rationale, "LLM分析失败: request timed out after 30s");
    }

    #[test]
    fn test_state_trails() {
        use AnalysisState::*;

        assert_eq!(
            AnalysisState::trail(StageTag::StrictJson),
            vec![Requesting, ParsingStrict, Reconciling, Done]
        );
        assert_eq!(
            AnalysisState::trail(StageTag::NestedUnwrap),
            vec![Requesting, ParsingStrict, ParsingNested, Reconciling, Done]
        );
        assert_eq!(
            AnalysisState::trail(StageTag::Failed),
            vec![Requesting, ParsingStrict, ParsingRepaired, ScanningText, Reconciling, Done]
        );
    }

    #[test]
    fn test_request_prompt() {
        let prompt = request().prompt();
        assert_eq!(prompt.system, "你是分析师");
        assert_eq!(prompt.user, "分析贵州茅台");
    }
}
