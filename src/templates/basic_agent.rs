//! Basic general-purpose agent template.
//!
//! Builds an agent with a fixed system prompt and two placeholder tools,
//! `get_information` and `process_data`. Replace the tool bodies and prompt
//! when adapting the template.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::{Agent, AgentError, RunContext};
use crate::llms::providers::openai::OpenAICompletion;
use crate::llms::BaseLLM;
use crate::tools::{parse_args, ToolError};

/// System prompt of the basic template.
pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant.
Your capabilities are determined by the tools and configurations provided.
Always be helpful, accurate, and concise in your responses.

Key Guidelines:
1. Provide clear and actionable responses
2. Ask for clarification when needed
3. Use tools appropriately
4. Maintain a professional tone";

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

// ---------------------------------------------------------------------------
// AgentDeps
// ---------------------------------------------------------------------------

/// Dependencies the template agent is run with.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDeps {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub custom_data: Option<Map<String, Value>>,
}

impl AgentDeps {
    /// Deps with the default model settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            custom_data: None,
        }
    }

    /// Deps keyed from `OPENAI_API_KEY` (empty when unset).
    pub fn from_env() -> Self {
        Self::new(std::env::var("OPENAI_API_KEY").unwrap_or_default())
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_custom_data(mut self, custom_data: Map<String, Value>) -> Self {
        self.custom_data = Some(custom_data);
        self
    }
}

impl fmt::Debug for AgentDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDeps")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("custom_data", &self.custom_data)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TopicArgs {
    topic: String,
}

#[derive(Deserialize)]
struct DataArgs {
    data: Map<String, Value>,
}

/// Placeholder answer for `get_information`.
pub fn get_information(topic: &str) -> String {
    format!("Information about {}: This is a placeholder response.", topic)
}

/// Shallow copy of `data` with `processed` set to `true`.
pub fn process_data(data: &Map<String, Value>) -> Map<String, Value> {
    let mut processed = data.clone();
    processed.insert("processed".to_string(), Value::Bool(true));
    processed
}

fn add_tools(agent: &mut Agent<AgentDeps>) {
    agent.tool(
        "get_information",
        "Get information about a specific topic",
        serde_json::json!({
            "type": "object",
            "properties": {
                "topic": {"type": "string", "description": "The topic to get information about"}
            },
            "required": ["topic"]
        }),
        |_ctx: RunContext<AgentDeps>, args| async move {
            let args: TopicArgs = parse_args(args)?;
            Ok(Value::String(get_information(&args.topic)))
        },
    );

    agent.tool(
        "process_data",
        "Process structured data",
        serde_json::json!({
            "type": "object",
            "properties": {
                "data": {"type": "object", "description": "The data to process"}
            },
            "required": ["data"]
        }),
        |_ctx: RunContext<AgentDeps>, args| async move {
            let args: DataArgs = parse_args(args)?;
            Ok::<_, ToolError>(Value::Object(process_data(&args.data)))
        },
    );
}

// ---------------------------------------------------------------------------
// BasicAgentTemplate
// ---------------------------------------------------------------------------

/// Basic agent template for general-purpose tasks.
pub struct BasicAgentTemplate {
    deps: AgentDeps,
    agent: Agent<AgentDeps>,
}

impl fmt::Debug for BasicAgentTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAgentTemplate")
            .field("deps", &self.deps)
            .field("agent", &self.agent)
            .finish()
    }
}

impl BasicAgentTemplate {
    /// Build the template on an OpenAI backend configured from `deps`.
    pub fn new(deps: AgentDeps) -> Self {
        let api_key = if deps.api_key.is_empty() {
            None
        } else {
            Some(deps.api_key.clone())
        };
        let llm = OpenAICompletion::new(deps.model.clone(), api_key, None)
            .with_temperature(deps.temperature)
            .with_max_tokens(deps.max_tokens);
        Self::with_llm(deps, Arc::new(llm))
    }

    /// Build the template on any backend.
    pub fn with_llm(deps: AgentDeps, llm: Arc<dyn BaseLLM>) -> Self {
        let mut agent = Agent::new(llm, SYSTEM_PROMPT);
        add_tools(&mut agent);
        log::debug!("Created basic agent template: model={}", deps.model);
        Self { deps, agent }
    }

    pub fn deps(&self) -> &AgentDeps {
        &self.deps
    }

    pub fn agent(&self) -> &Agent<AgentDeps> {
        &self.agent
    }

    /// Mutable access, e.g. for attaching capability servers.
    pub fn agent_mut(&mut self) -> &mut Agent<AgentDeps> {
        &mut self.agent
    }

    /// Run the agent with a message and return its reply.
    pub async fn run(&self, message: &str) -> Result<String, AgentError> {
        let result = self.agent.run(message, self.deps.clone()).await?;
        Ok(result.data)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
