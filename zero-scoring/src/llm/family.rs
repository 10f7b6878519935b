//! Provider wire formats.
//!
//! Two families are supported:
//! - `Candidates` (Gemini): `{"candidates":[{"content":{"parts":[{"text": ...}]}}]}`
//! - `Choices` (OpenAI-compatible): `{"choices":[{"message":{"content": ...}}]}`

use serde_json::{json, Value};
use zero_common::config::LlmConfig;

use super::{LlmError, Prompt};

/// Response/request envelope family of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    /// Single-message/candidate format
    Candidates,
    /// Choices/message format
    Choices,
}

impl ProviderFamily {
    /// Map a provider discriminator to its family.
    ///
    /// Unknown providers are assumed OpenAI-compatible.
    pub fn from_provider(provider: &str) -> Self {
        match provider.trim().to_lowercase().as_str() {
            "google" | "gemini" => Self::Candidates,
            _ => Self::Choices,
        }
    }

    /// Build the request URL (Gemini carries the key in the query string).
    pub fn request_url(self, config: &LlmConfig) -> String {
        match (self, config.api_key.as_deref()) {
            (Self::Candidates, Some(key)) if !key.is_empty() => {
                let separator = if config.api_url.contains('?') { '&' } else { '?' };
                format!("{}{}key={}", config.api_url, separator, key)
            }
            _ => config.api_url.clone(),
        }
    }

    /// Bearer token to send, if any.
    pub fn bearer_token(self, config: &LlmConfig) -> Option<&str> {
        match self {
            Self::Candidates => None,
            Self::Choices => config.api_key.as_deref().filter(|key| !key.is_empty()),
        }
    }

    /// Build the JSON request body.
    pub fn build_request(self, config: &LlmConfig, prompt: &Prompt) -> Value {
        match self {
            Self::Candidates => json!({
                "contents": [{
                    "role": "user",
                    "parts": [{ "text": prompt.combined() }],
                }],
                "generationConfig": {
                    "temperature": config.temperature,
                    "maxOutputTokens": config.max_tokens,
                },
            }),
            Self::Choices => {
                let mut messages = Vec::with_capacity(2);
                if !prompt.system.trim().is_empty() {
                    messages.push(json!({"role": "system", "content": prompt.system}));
                }
                messages.push(json!({"role": "user", "content": prompt.user}));

                json!({
                    "model": config.model,
                    "messages": messages,
                    "temperature": config.temperature,
                    "max_tokens": config.max_tokens,
                })
            }
        }
    }

    /// Pull the payload text out of a response envelope.
    pub fn extract_payload(self, envelope: &Value) -> Result<String, LlmError> {
        let (pointer, path) = match self {
            Self::Candidates => (
                "/candidates/0/content/parts/0/text",
                "candidates[0].content.parts[0].text",
            ),
            Self::Choices => ("/choices/0/message/content", "choices[0].message.content"),
        };

        envelope
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LlmError::MalformedEnvelope(format!("missing {}", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str, key: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            api_url: "https://llm.example.com/v1/generate".to_string(),
            api_key: key.map(str::to_string),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_from_provider() {
        assert_eq!(ProviderFamily::from_provider("google"), ProviderFamily::Candidates);
        assert_eq!(ProviderFamily::from_provider("Gemini"), ProviderFamily::Candidates);
        for provider in ["deepseek", "qwen", "openai", "ollama", "something-else"] {
            assert_eq!(ProviderFamily::from_provider(provider), ProviderFamily::Choices);
        }
    }

    #[test]
    fn test_candidates_request() {
        let cfg = config("google", Some("k1"));
        let family = ProviderFamily::Candidates;
        let body = family.build_request(&cfg, &Prompt::new("你是分析师", "分析600519"));

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "你是分析师\n\n分析600519");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2000);
        assert_eq!(family.request_url(&cfg), "https://llm.example.com/v1/generate?key=k1");
        assert_eq!(family.bearer_token(&cfg), None);
    }

    #[test]
    fn test_choices_request() {
        let cfg = config("deepseek", Some("sk-test"));
        let family = ProviderFamily::Choices;
        let body = family.build_request(&cfg, &Prompt::new("你是分析师", "分析600519"));

        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "分析600519");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(family.request_url(&cfg), cfg.api_url);
        assert_eq!(family.bearer_token(&cfg), Some("sk-test"));
    }

    #[test]
    fn test_choices_without_key_or_system() {
        let cfg = config("ollama", None);
        let family = ProviderFamily::Choices;
        let body = family.build_request(&cfg, &Prompt::new("", "hi"));

        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(family.bearer_token(&cfg), None);
    }

    #[test]
    fn test_extract_payload() {
        let candidates = json!({"candidates": [{"content": {"parts": [{"text": "{\"score\": 0.7}"}]}}]});
        assert_eq!(
            ProviderFamily::Candidates.extract_payload(&candidates).unwrap(),
            "{\"score\": 0.7}"
        );

        let choices = json!({"choices": [{"message": {"content": "评分是85"}}]});
        assert_eq!(ProviderFamily::Choices.extract_payload(&choices).unwrap(), "评分是85");
    }

    #[test]
    fn test_extract_payload_wrong_family() {
        let choices = json!({"choices": [{"message": {"content": "x"}}]});
        let err = ProviderFamily::Candidates.extract_payload(&choices).unwrap_err();
        assert!(matches!(err, LlmError::MalformedEnvelope(_)));
        assert!(err.to_string().contains("candidates[0]"));
    }
}
