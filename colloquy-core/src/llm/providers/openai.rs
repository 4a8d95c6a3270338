//! OpenAI-compatible chat completion client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{ColloquyError, Result};
use crate::llm::{
    CompletionClient, CompletionRequest, CompletionResponse, Message, ModelInfo, TokenUsage,
};

/// Environment variables consulted for the API key, in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["OPENAI_API_KEY", "API_KEY"];

/// Client for any endpoint speaking the OpenAI chat completions protocol.
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    /// Create a client with the default request timeout.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token for the endpoint
    /// * `base_url` - API base URL (e.g., "https://api.openai.com/v1")
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, base_url, LlmConfig::default().request_timeout)
    }

    /// Create a client whose requests give up after `timeout`.
    pub fn with_timeout(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ColloquyError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create from configuration, taking the API key from the config or the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(config.api_key.as_deref(), |name| std::env::var(name).ok())
            .ok_or_else(|| {
                ColloquyError::Configuration(format!(
                    "API key not configured; set COLLOQUY_LLM__API_KEY or one of {}",
                    API_KEY_ENV_VARS.join(", ")
                ))
            })?;

        Self::with_timeout(api_key, &config.base_url, config.request_timeout)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Pick the API key: explicit configuration first, then the environment.
fn resolve_api_key(
    configured: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    configured
        .map(str::to_string)
        .or_else(|| API_KEY_ENV_VARS.iter().find_map(|&name| lookup(name)))
        .filter(|key| !key.trim().is_empty())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

fn parse_response(body: &str) -> Result<CompletionResponse> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
        ColloquyError::Completion(format!("Failed to parse completion response: {}", e))
    })?;

    let content = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ColloquyError::Completion("API returned no choices".to_string()))?
        .message
        .and_then(|m| m.content)
        .unwrap_or_default();

    let usage = response.usage.map(|u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(CompletionResponse { content, usage })
}

fn describe_error(status: reqwest::StatusCode, body: &str) -> ColloquyError {
    if let Ok(error) = serde_json::from_str::<ApiError>(body) {
        return ColloquyError::Completion(format!(
            "API error ({}): {}",
            error.error.error_type.unwrap_or_else(|| status.to_string()),
            error.error.message
        ));
    }

    ColloquyError::Completion(format!("API error ({}): {}", status, body))
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ColloquyError::Completion(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ColloquyError::Completion(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(describe_error(status, &text));
        }

        parse_response(&text)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "openai".to_string(),
            base_url: self.base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    #[test]
    fn test_client_creation() {
        let client = OpenAiClient::new("test-key", "https://api.openai.com/v1/").unwrap();
        assert_eq!(client.base_url(), "https://api.openai.com/v1");
        assert_eq!(client.model_info().provider, "openai");
    }

    #[test]
    fn test_resolve_api_key_prefers_config() {
        let key = resolve_api_key(Some("from-config"), |_| Some("from-env".to_string()));
        assert_eq!(key.as_deref(), Some("from-config"));
    }

    #[test]
    fn test_resolve_api_key_env_order() {
        let key = resolve_api_key(None, |name| match name {
            "API_KEY" => Some("legacy".to_string()),
            _ => None,
        });
        assert_eq!(key.as_deref(), Some("legacy"));

        let key = resolve_api_key(None, |name| Some(format!("{name}-value")));
        assert_eq!(key.as_deref(), Some("OPENAI_API_KEY-value"));
    }

    #[test]
    fn test_resolve_api_key_missing() {
        assert!(resolve_api_key(None, |_| None).is_none());
        assert!(resolve_api_key(Some("  "), |_| None).is_none());
    }

    #[test]
    fn test_request_wire_format() {
        let messages = vec![Message::system("Be brief"), Message::user("Hello")];
        let body = ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            temperature: 0.5,
            max_tokens: 200,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["max_tokens"], 200);
        assert_eq!(json["messages"][0]["role"], MessageRole::System.as_str());
        assert_eq!(json["messages"][1]["content"], "Hello");
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "WHAT DO YOU WANT"}}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 5, "total_tokens": 25}
        }"#;

        let response = parse_response(body).unwrap();
        assert_eq!(response.content, "WHAT DO YOU WANT");
        assert_eq!(response.usage.unwrap().total_tokens, 25);
    }

    #[test]
    fn test_parse_response_without_choices() {
        let result = parse_response(r#"{"choices": []}"#);
        assert!(matches!(result, Err(ColloquyError::Completion(_))));
    }

    #[test]
    fn test_parse_response_malformed() {
        let result = parse_response("<html>bad gateway</html>");
        assert!(matches!(result, Err(ColloquyError::Completion(_))));
    }

    #[test]
    fn test_describe_error() {
        let body = r#"{"error": {"message": "Invalid API key", "type": "invalid_request_error"}}"#;
        let err = describe_error(reqwest::StatusCode::UNAUTHORIZED, body);
        assert!(err.to_string().contains("invalid_request_error"));
        assert!(err.to_string().contains("Invalid API key"));

        let err = describe_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_completion_error() {
        let client = OpenAiClient::with_timeout(
            "test-key",
            "http://127.0.0.1:9/v1",
            Duration::from_secs(2),
        )
        .unwrap();

        let request = CompletionRequest {
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 10,
            messages: vec![Message::user("hello")],
        };

        let result = client.complete(&request).await;
        assert!(matches!(result, Err(ColloquyError::Completion(_))));
    }
}
