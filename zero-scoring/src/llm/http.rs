//! HTTP transport for LLM providers.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use zero_common::config::LlmConfig;
use zero_common::util::{sanitize_for_log, truncate_with_ellipsis};

use super::{LlmClient, LlmError, Prompt, ProviderFamily};

/// Error bodies longer than this are cut before logging or returning.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// LLM client over `reqwest` with per-attempt timeout and exponential backoff.
pub struct HttpLlmClient {
    config: LlmConfig,
    family: ProviderFamily,
    client: reqwest::Client,
}

impl HttpLlmClient {
    /// Create a new client for the configured provider.
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let family = ProviderFamily::from_provider(&config.provider);

        Self {
            config,
            family,
            client,
        }
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    /// First attempt plus configured retries.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries.saturating_add(1)
    }

    /// Sleep before the retry following `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        let millis = self
            .config
            .backoff_ms
            .saturating_mul(factor)
            .min(self.config.max_backoff_ms);
        Duration::from_millis(millis)
    }

    async fn try_complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let url = self.family.request_url(&self.config);
        let body = self.family.build_request(&self.config, prompt);

        debug!(
            provider = %self.config.provider,
            url = %sanitize_for_log(&url),
            "Sending request to LLM API"
        );

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = self.family.bearer_token(&self.config) {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body: truncate_with_ellipsis(&sanitize_for_log(&text), MAX_ERROR_BODY_CHARS),
            });
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedEnvelope(format!("response is not JSON: {}", e)))?;

        self.family.extract_payload(&envelope)
    }

    fn transport_error(&self, err: reqwest::Error) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(self.config.timeout_secs)
        } else {
            LlmError::Transport(sanitize_for_log(&err.to_string()))
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    fn name(&self) -> &str {
        &self.config.provider
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let max_attempts = self.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.try_complete(prompt).await {
                Ok(text) => {
                    debug!(
                        provider = %self.config.provider,
                        attempt,
                        chars = text.chars().count(),
                        "LLM request successful"
                    );
                    return Ok(text);
                }
                Err(e) if !e.is_recoverable() => {
                    warn!(
                        provider = %self.config.provider,
                        attempt,
                        error = %e,
                        "LLM request failed, not retrying"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        provider = %self.config.provider,
                        attempt,
                        max_attempts,
                        error = %e,
                        "LLM request failed, retrying..."
                    );
                    last_error = Some(e);

                    if attempt < max_attempts {
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                    }
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: max_attempts,
            last: Box::new(
                last_error.unwrap_or_else(|| LlmError::Transport("no attempt made".to_string())),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let client = HttpLlmClient::new(LlmConfig {
            backoff_ms: 1000,
            max_backoff_ms: 8000,
            ..LlmConfig::default()
        });

        assert_eq!(client.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(client.backoff_for(2), Duration::from_millis(2000));
        assert_eq!(client.backoff_for(3), Duration::from_millis(4000));
        assert_eq!(client.backoff_for(4), Duration::from_millis(8000));
        assert_eq!(client.backoff_for(10), Duration::from_millis(8000));
        assert_eq!(client.backoff_for(200), Duration::from_millis(8000));
    }

    #[test]
    fn test_max_attempts_saturates() {
        let client = HttpLlmClient::new(LlmConfig {
            max_retries: 2,
            ..LlmConfig::default()
        });
        assert_eq!(client.max_attempts(), 3);

        let client = HttpLlmClient::new(LlmConfig {
            max_retries: u32::MAX,
            ..LlmConfig::default()
        });
        assert_eq!(client.max_attempts(), u32::MAX);
    }

    #[test]
    fn test_family_from_config() {
        let client = HttpLlmClient::new(LlmConfig {
            provider: "google".to_string(),
            ..LlmConfig::default()
        });
        assert_eq!(client.family(), ProviderFamily::Candidates);
        assert_eq!(client.name(), "google");
    }
}
