//! Base LLM trait and shared provider state.
//!
//! Provides the trait every chat backend implements, the message type
//! exchanged with it, and the state that concrete providers embed.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// LLM Message type alias
// ---------------------------------------------------------------------------

/// A single message in an LLM conversation.
///
/// Carries `role` and `content`, plus `tool_calls` on assistant messages and
/// `tool_call_id` on tool results.
pub type LLMMessage = HashMap<String, Value>;

/// Build a message with the given role and text content.
pub fn message(role: &str, content: impl Into<String>) -> LLMMessage {
    let mut msg = HashMap::new();
    msg.insert("role".to_string(), Value::String(role.to_string()));
    msg.insert("content".to_string(), Value::String(content.into()));
    msg
}

// ---------------------------------------------------------------------------
// BaseLLM trait
// ---------------------------------------------------------------------------

/// Interface shared by LLM backends.
///
/// A backend takes the conversation so far plus the tool schemas the model may
/// call, and returns either:
///
/// * `Value::String` with the final text reply, or
/// * the assistant message object, containing a non-empty `tool_calls` array,
///   when the model asked for tools to be run.
#[async_trait]
pub trait BaseLLM: Send + Sync + fmt::Debug {
    /// Get the model identifier/name.
    fn model(&self) -> &str;

    /// Get the optional temperature setting.
    fn temperature(&self) -> Option<f64>;

    /// Check if the LLM supports function calling. Agents only send tool
    /// schemas to backends that do.
    fn supports_function_calling(&self) -> bool {
        false
    }

    /// Call the LLM with the given messages.
    ///
    /// # Arguments
    ///
    /// * `messages` - Conversation so far.
    /// * `tools` - Optional tool schemas in OpenAI function format.
    async fn acall(
        &self,
        messages: Vec<LLMMessage>,
        tools: Option<Vec<Value>>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>>;
}

// ---------------------------------------------------------------------------
// BaseLLMState - shared state for LLM implementations
// ---------------------------------------------------------------------------

/// Shared state for LLM implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseLLMState {
    /// The model identifier/name.
    pub model: String,
    /// Optional temperature setting for response generation.
    pub temperature: Option<f64>,
    /// Optional API key.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Optional base URL for the API.
    pub base_url: Option<String>,
}

impl BaseLLMState {
    /// Create a new `BaseLLMState` with the given model name.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            api_key: None,
            base_url: None,
        }
    }
}

/// Whether an LLM reply asks for tool calls.
pub fn has_tool_calls(response: &Value) -> bool {
    response
        .get("tool_calls")
        .and_then(Value::as_array)
        .map_or(false, |calls| !calls.is_empty())
}

// ---------------------------------------------------------------------------
// Scripted backend for tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;

    /// Backend that replays canned replies and records every request.
    #[derive(Debug)]
    pub struct ScriptedLLM {
        replies: Mutex<VecDeque<Value>>,
        function_calling: bool,
        pub requests: Mutex<Vec<(Vec<LLMMessage>, Option<Vec<Value>>)>>,
    }

    impl ScriptedLLM {
        pub fn new(replies: Vec<Value>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                function_calling: true,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Report no function-calling support.
        pub fn without_function_calling(mut self) -> Self {
            self.function_calling = false;
            self
        }

        /// A reply asking for one tool call.
        pub fn tool_call(id: &str, name: &str, args: Value) -> Value {
            serde_json::json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": args.to_string()}
                }]
            })
        }
    }

    #[async_trait]
    impl BaseLLM for ScriptedLLM {
        fn model(&self) -> &str {
            "scripted"
        }

        fn temperature(&self) -> Option<f64> {
            None
        }

        fn supports_function_calling(&self) -> bool {
            self.function_calling
        }

        async fn acall(
            &self,
            messages: Vec<LLMMessage>,
            tools: Option<Vec<Value>>,
        ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
            self.requests.lock().push((messages, tools));
            self.replies
                .lock()
                .pop_front()
                .ok_or_else(|| "script exhausted".into())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
