//! OpenAI chat completions provider.
//!
//! Posts to `{base_url}/chat/completions` through `reqwest`. Works with any
//! endpoint that speaks the OpenAI chat completions format. Supports native
//! function calling; one request per call, no retries.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llms::base_llm::{BaseLLM, BaseLLMState, LLMMessage};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 120.0;

// ---------------------------------------------------------------------------
// OpenAICompletion provider
// ---------------------------------------------------------------------------

/// OpenAI native completion implementation.
///
/// # Example
///
/// ```rust
/// use agent_builder::llms::providers::openai::OpenAICompletion;
/// use agent_builder::llms::BaseLLM;
///
/// let provider = OpenAICompletion::new("gpt-4", Some("sk-test".to_string()), None)
///     .with_temperature(0.7)
///     .with_max_tokens(1000);
/// assert_eq!(provider.model(), "gpt-4");
/// assert_eq!(provider.api_base_url(), "https://api.openai.com/v1");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAICompletion {
    /// Shared base LLM state.
    #[serde(flatten)]
    pub state: BaseLLMState,

    /// Request timeout in seconds.
    pub timeout: Option<f64>,
    /// Maximum tokens in response.
    pub max_tokens: Option<u32>,
}

impl OpenAICompletion {
    /// Create a new OpenAI completion provider.
    ///
    /// # Arguments
    ///
    /// * `model` - OpenAI model name (e.g., "gpt-4", "gpt-4o").
    /// * `api_key` - Optional API key (defaults to OPENAI_API_KEY env var).
    /// * `base_url` - Optional custom base URL.
    pub fn new(
        model: impl Into<String>,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        let api_key = api_key.or_else(|| std::env::var("OPENAI_API_KEY").ok());

        let mut state = BaseLLMState::new(model);
        state.api_key = api_key;
        state.base_url = base_url;

        Self {
            state,
            timeout: None,
            max_tokens: None,
        }
    }

    /// Builder method to set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.state.temperature = Some(temperature);
        self
    }

    /// Builder method to set the response token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Builder method to set the request timeout in seconds.
    ///
    /// A negative, NaN or out-of-range value makes every call fail with an
    /// invalid-timeout error instead of sending a request.
    pub fn with_timeout(mut self, timeout_secs: f64) -> Self {
        self.timeout = Some(timeout_secs);
        self
    }

    /// Get the API base URL.
    pub fn api_base_url(&self) -> String {
        self.state
            .base_url
            .clone()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Build the request body for the Chat Completions API.
    pub fn build_request_body(&self, messages: &[LLMMessage], tools: Option<&[Value]>) -> Value {
        let mut body = serde_json::json!({
            "model": self.state.model,
            "messages": messages,
        });

        if let Some(temp) = self.state.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = serde_json::json!(tools);
                body["tool_choice"] = serde_json::json!("auto");
            }
        }

        body
    }

    /// Parse a Chat Completions API response.
    fn parse_completions_response(
        &self,
        response: &Value,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let choice = response
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or("No choices in OpenAI response")?;

        let message = choice.get("message").ok_or("No message in OpenAI choice")?;

        if let Some(usage) = response.get("usage") {
            log::debug!(
                "OpenAI token usage: prompt={}, completion={}, total={}",
                usage.get("prompt_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
                usage.get("completion_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
                usage.get("total_tokens").and_then(|v| v.as_i64()).unwrap_or(0),
            );
        }

        // Hand tool calls back to the agent loop untouched
        let wants_tools = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map_or(false, |calls| !calls.is_empty());
        if wants_tools {
            return Ok(message.clone());
        }

        let content = message.get("content").and_then(|c| c.as_str()).unwrap_or("");
        Ok(Value::String(content.to_string()))
    }
}

#[async_trait]
impl BaseLLM for OpenAICompletion {
    fn model(&self) -> &str {
        &self.state.model
    }

    fn temperature(&self) -> Option<f64> {
        self.state.temperature
    }

    fn supports_function_calling(&self) -> bool {
        true
    }

    async fn acall(
        &self,
        messages: Vec<LLMMessage>,
        tools: Option<Vec<Value>>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        log::debug!(
            "OpenAICompletion.acall: model={}, messages={}, tools={:?}",
            self.state.model,
            messages.len(),
            tools.as_ref().map(|t| t.len()),
        );

        let api_key = self.state.api_key.as_ref().ok_or(
            "OpenAI API key not set. Set OPENAI_API_KEY environment variable or pass api_key to constructor.",
        )?;

        let body = self.build_request_body(&messages, tools.as_deref());
        let endpoint = format!("{}/chat/completions", self.api_base_url());

        let timeout_secs = self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let timeout = Duration::try_from_secs_f64(timeout_secs)
            .map_err(|e| format!("Invalid OpenAI timeout {}: {}", timeout_secs, e))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let response = client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if status.is_client_error() || status.is_server_error() {
            log::warn!("OpenAI API call failed: model={}, status={}", self.state.model, status);
            return Err(format!("OpenAI API error ({}): {}", status, response_text).into());
        }

        let response_json: Value = serde_json::from_str(&response_text).map_err(|e| {
            let preview: String = response_text.chars().take(500).collect();
            format!("Failed to parse OpenAI response: {} - Body: {}", e, preview)
        })?;

        self.parse_completions_response(&response_json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::base_llm::message;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAICompletion {
        OpenAICompletion::new("gpt-4", Some("sk-test".to_string()), Some(server.uri()))
    }

    #[test]
    fn test_builder_and_body() {
        let llm = OpenAICompletion::new("gpt-4", Some("k".to_string()), Some("http://x/v1/".into()))
            .with_temperature(0.7)
            .with_max_tokens(1000)
            .with_timeout(5.0);
        assert_eq!(llm.api_base_url(), "http://x/v1");
        assert_eq!(llm.timeout, Some(5.0));

        let tools = vec![serde_json::json!({"type": "function", "function": {"name": "t"}})];
        let body = llm.build_request_body(&[message("user", "hi")], Some(&tools));
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_body_omits_empty_tools() {
        let llm = OpenAICompletion::new("gpt-4", Some("k".to_string()), None);
        let body = llm.build_request_body(&[], Some(&[]));
        assert!(body.get("tools").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[tokio::test]
    async fn test_text_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi there"}}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider(&server)
            .acall(vec![message("user", "Hello")], None)
            .await
            .unwrap();
        assert_eq!(reply, Value::String("Hi there".to_string()));
    }

    #[tokio::test]
    async fn test_tool_call_reply_returned_as_message() {
        let server = MockServer::start().await;
        let msg = serde_json::json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "c1", "type": "function",
                "function": {"name": "get_information", "arguments": "{\"topic\":\"rust\"}"}}]
        });
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"choices": [{"message": msg.clone()}]})),
            )
            .mount(&server)
            .await;

        let reply = provider(&server).acall(vec![], None).await.unwrap();
        assert_eq!(reply, msg);
    }

    #[tokio::test]
    async fn test_error_status_is_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server).acall(vec![], None).await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_missing_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = provider(&server).acall(vec![], None).await.unwrap_err();
        assert!(err.to_string().contains("No choices"));
    }

    #[tokio::test]
    async fn test_invalid_timeout_fails_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(0)
            .mount(&server)
            .await;

        for timeout in [-1.0, f64::NAN, f64::INFINITY] {
            let err = provider(&server)
                .with_timeout(timeout)
                .acall(vec![message("user", "Hello")], None)
                .await
                .unwrap_err();
            assert!(err.to_string().contains("Invalid OpenAI timeout"));
        }
    }
}
