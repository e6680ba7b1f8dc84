//! OpenAI-compatible chat completion client
//!
//! Works with any provider exposing `/chat/completions` (OpenRouter by default).

use crate::http::{status_error, transport_error};
use kbchat_core::{
    async_trait, ErrorContext, GenerativeBackend, KbChatError, KbChatResult, LlmConfig,
    PromptMessage,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const COMPONENT: &str = "llm_client";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    /// Usually a string, but some providers return structured parts
    content: Option<Value>,
}

/// Render message content as text.
///
/// Strings are used verbatim. Any other JSON payload is serialized.
pub fn content_to_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Chat completion client for OpenAI-compatible APIs
pub struct OpenAiCompatibleClient {
    client: Client,
    config: LlmConfig,
    timeout: Duration,
}

impl OpenAiCompatibleClient {
    /// Create a new client. Requires an API key in the config.
    pub fn new(config: LlmConfig, timeout: Duration) -> KbChatResult<Self> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(KbChatError::Config {
                message: format!("API key not configured for provider {}", config.provider),
                source: None,
                context: ErrorContext::new(COMPONENT)
                    .with_operation("new")
                    .with_suggestion("Set OPENROUTER_API_KEY or llm.api_key"),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KbChatError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new(COMPONENT).with_operation("new"),
            })?;

        info!(
            provider = %config.provider,
            model = %config.model,
            base_url = %config.base_url,
            "Created LLM client"
        );

        Ok(Self {
            client,
            config,
            timeout,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn llm_error(&self, message: String) -> KbChatError {
        KbChatError::Llm {
            message,
            provider: Some(self.config.provider.clone()),
            model: Some(self.config.model.clone()),
            context: ErrorContext::new(COMPONENT).with_operation("complete"),
        }
    }
}

#[async_trait]
impl GenerativeBackend for OpenAiCompatibleClient {
    async fn complete(&self, messages: &[PromptMessage]) -> KbChatResult<String> {
        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        debug!(
            model = %self.config.model,
            message_count = messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(COMPONENT, "complete", self.timeout, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(COMPONENT, "complete", self.timeout, e))?;

        if !status.is_success() {
            return Err(status_error(COMPONENT, "complete", status, &body, |m| {
                self.llm_error(m)
            }));
        }

        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| self.llm_error(format!("Failed to parse response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| self.llm_error("API returned no choices".to_string()))?;

        let content = choice
            .message
            .content
            .ok_or_else(|| self.llm_error("API returned no message content".to_string()))?;

        let text = content_to_text(&content);

        debug!(
            model = ?parsed.model,
            finish_reason = ?choice.finish_reason,
            response_chars = text.len(),
            "Received chat completion"
        );

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_content_is_used_verbatim() {
        assert_eq!(content_to_text(&json!("Open 9-5")), "Open 9-5");
    }

    #[test]
    fn structured_content_is_serialized() {
        let parts = json!([{"type": "text", "text": "hi"}]);
        let text = content_to_text(&parts);
        assert!(text.starts_with('['));
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), parts);
        assert_eq!(content_to_text(&json!(42)), "42");
    }

    #[test]
    fn client_requires_api_key() {
        let result = OpenAiCompatibleClient::new(LlmConfig::default(), Duration::from_secs(30));
        assert!(matches!(result, Err(KbChatError::Config { .. })));
    }

    #[test]
    fn request_serializes_prompt_roles() {
        let messages = vec![PromptMessage::user("hello")];
        let request = CompletionRequest {
            model: "m",
            messages: &messages,
            temperature: 0.7,
            max_tokens: None,
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value.get("max_tokens").is_none());
    }
}
