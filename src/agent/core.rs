//! Core Agent struct.
//!
//! An `Agent<D>` is run with a dependency value of type `D`, which every
//! tool sees through its [`RunContext`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::AgentError;
use super::run_context::RunContext;
use crate::llms::base_llm::{has_tool_calls, message, BaseLLM, LLMMessage};
use crate::mcp::TransportHandle;
use crate::tools::{BaseTool, Tool, ToolError};

/// Maximum LLM round trips in one run unless overridden.
pub const DEFAULT_MAX_ITER: usize = 25;

// ---------------------------------------------------------------------------
// AgentRunResult
// ---------------------------------------------------------------------------

/// Result of a completed [`Agent::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunResult {
    /// Final text reply of the model.
    pub data: String,
    /// LLM round trips the run took.
    #[serde(default)]
    pub iterations: usize,
}

impl fmt::Display for AgentRunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data)
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// An LLM agent with native tool calling.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use agent_builder::agent::Agent;
/// use agent_builder::llms::providers::openai::OpenAICompletion;
///
/// # async fn demo() -> Result<(), agent_builder::agent::AgentError> {
/// let llm = OpenAICompletion::new("gpt-4", None, None);
/// let mut agent: Agent<()> = Agent::new(Arc::new(llm), "You are terse.");
/// agent.tool(
///     "ping",
///     "Answer with pong",
///     serde_json::json!({"type": "object", "properties": {}}),
///     |_ctx, _args| async { Ok(serde_json::json!("pong")) },
/// );
/// let result = agent.run("ping please", ()).await?;
/// println!("{}", result.data);
/// # Ok(())
/// # }
/// ```
pub struct Agent<D: Send + Sync + 'static> {
    llm: Arc<dyn BaseLLM>,
    system_prompt: String,
    max_iter: usize,
    tools: Vec<Arc<dyn BaseTool<D>>>,
    /// Capability servers attached to this agent.
    pub mcp_servers: Vec<TransportHandle>,
}

impl<D: Send + Sync + 'static> fmt::Debug for Agent<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.llm.model())
            .field("system_prompt", &self.system_prompt)
            .field("max_iter", &self.max_iter)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("mcp_servers", &self.mcp_servers)
            .finish()
    }
}

impl<D: Send + Sync + 'static> Agent<D> {
    /// Create an agent with no tools and no capability servers.
    pub fn new(llm: Arc<dyn BaseLLM>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            max_iter: DEFAULT_MAX_ITER,
            tools: Vec::new(),
            mcp_servers: Vec::new(),
        }
    }

    /// Builder method to set the iteration limit.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn llm(&self) -> &Arc<dyn BaseLLM> {
        &self.llm
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn add_tool<T: BaseTool<D> + 'static>(&mut self, tool: T) -> &mut Self {
        if let Some(pos) = self.tools.iter().position(|t| t.name() == tool.name()) {
            log::warn!("Replacing already registered tool '{}'", tool.name());
            self.tools.remove(pos);
        }
        self.tools.push(Arc::new(tool));
        self
    }

    /// Register an async function as a tool.
    pub fn tool<F, Fut>(
        &mut self,
        name: &str,
        description: &str,
        parameters: Value,
        func: F,
    ) -> &mut Self
    where
        F: Fn(RunContext<D>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        self.add_tool(Tool::new(name, description, func).with_args_schema(parameters))
    }

    /// Names of the registered tools, in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Tool schemas in OpenAI function-calling format.
    pub fn tool_schemas(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.to_function_schema()).collect()
    }

    fn find_tool(&self, name: &str) -> Option<&Arc<dyn BaseTool<D>>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Call a registered tool directly, outside of a run.
    pub async fn call_tool(&self, name: &str, deps: D, args: Value) -> Result<Value, AgentError> {
        let tool = self
            .find_tool(name)
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))?;
        let ctx = RunContext::new(Arc::new(deps), self.llm.model(), None);
        tool.run(ctx, args).await.map_err(|source| AgentError::Tool {
            name: name.to_string(),
            source,
        })
    }

    /// Run the agent on one user message.
    ///
    /// Each iteration sends the conversation to the LLM. A text reply ends
    /// the run. A reply with tool calls runs every requested tool and feeds
    /// the results back as `tool` messages; failures are reported to the
    /// model the same way instead of ending the run.
    ///
    /// # Errors
    ///
    /// * [`AgentError::Llm`] if the backend fails.
    /// * [`AgentError::MaxIterationsExceeded`] if no text reply arrives
    ///   within `max_iter` round trips.
    pub async fn run(&self, user_message: &str, deps: D) -> Result<AgentRunResult, AgentError> {
        let deps = Arc::new(deps);
        let mut messages: Vec<LLMMessage> = vec![
            message("system", self.system_prompt.as_str()),
            message("user", user_message),
        ];
        let schemas = self.tool_schemas();
        let tools = if schemas.is_empty() {
            None
        } else if !self.llm.supports_function_calling() {
            log::warn!(
                "Model {} does not support function calling; {} tool(s) withheld",
                self.llm.model(),
                schemas.len()
            );
            None
        } else {
            Some(schemas)
        };

        log::debug!(
            "Agent run started: model={}, tools={}, mcp_servers={}",
            self.llm.model(),
            self.tools.len(),
            self.mcp_servers.len()
        );

        for iteration in 1..=self.max_iter {
            let reply = self
                .llm
                .acall(messages.clone(), tools.clone())
                .await
                .map_err(|e| AgentError::Llm(e.to_string()))?;

            if !has_tool_calls(&reply) {
                let data = match reply {
                    Value::String(text) => text,
                    other => other
                        .get("content")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| other.to_string()),
                };
                log::debug!("Agent run finished after {} iteration(s)", iteration);
                return Ok(AgentRunResult {
                    data,
                    iterations: iteration,
                });
            }

            let calls = reply
                .get("tool_calls")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            messages.push(assistant_message(reply));

            for call in calls {
                let call_id = call
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let content = self.execute_tool_call(&call, &call_id, &deps).await;

                let mut tool_msg = message("tool", content);
                tool_msg.insert("tool_call_id".to_string(), Value::String(call_id));
                messages.push(tool_msg);
            }
        }

        log::warn!("Agent exceeded {} iterations without a final answer", self.max_iter);
        Err(AgentError::MaxIterationsExceeded(self.max_iter))
    }

    /// Run one tool call from the model and render its outcome as text.
    async fn execute_tool_call(&self, call: &Value, call_id: &str, deps: &Arc<D>) -> String {
        let function = call.get("function").cloned().unwrap_or(Value::Null);
        let name = function.get("name").and_then(Value::as_str).unwrap_or_default();

        let Some(tool) = self.find_tool(name) else {
            log::warn!("Model requested unknown tool '{}'", name);
            return format!("Error: {}", AgentError::ToolNotFound(name.to_string()));
        };

        let args = match function.get("arguments") {
            Some(Value::String(raw)) if raw.trim().is_empty() => Value::Object(Default::default()),
            Some(Value::String(raw)) => match serde_json::from_str(raw) {
                Ok(args) => args,
                Err(e) => {
                    return format!("Error: {}", ToolError::InvalidArguments(e.to_string()));
                }
            },
            Some(other) => other.clone(),
            None => Value::Object(Default::default()),
        };

        log::debug!("Calling tool '{}' ({})", name, call_id);
        let ctx = RunContext::new(Arc::clone(deps), self.llm.model(), Some(call_id.to_string()));
        match tool.run(ctx, args).await {
            Ok(Value::String(text)) => text,
            Ok(other) => other.to_string(),
            Err(e) => {
                log::warn!("Tool '{}' failed: {}", name, e);
                format!("Error: {}", e)
            }
        }
    }
}

/// Turn an assistant reply object into a conversation message.
fn assistant_message(reply: Value) -> LLMMessage {
    let mut msg: LLMMessage = match reply {
        Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    };
    msg.entry("role".to_string())
        .or_insert_with(|| Value::String("assistant".to_string()));
    msg
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::base_llm::testing::ScriptedLLM;
    use crate::tools::parse_args;
    use serde::Deserialize;

    #[derive(Debug)]
    struct Deps {
        greeting: String,
    }

    #[derive(Deserialize)]
    struct NameArgs {
        name: String,
    }

    fn greet_agent(llm: Arc<ScriptedLLM>) -> Agent<Deps> {
        let mut agent = Agent::new(llm, "You greet people.");
        agent.tool(
            "greet",
            "Greet someone by name",
            serde_json::json!({
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }),
            |ctx: RunContext<Deps>, args| async move {
                let args: NameArgs = parse_args(args)?;
                Ok(Value::String(format!("{}, {}!", ctx.deps.greeting, args.name)))
            },
        );
        agent
    }

    fn deps() -> Deps {
        Deps {
            greeting: "Hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_text_reply_ends_run() {
        let llm = Arc::new(ScriptedLLM::new(vec![Value::String("hi".into())]));
        let agent = greet_agent(llm.clone());
        let result = agent.run("hey", deps()).await.unwrap();
        assert_eq!(result.data, "hi");
        assert_eq!(result.iterations, 1);

        let requests = llm.requests.lock();
        let (messages, tools) = &requests[0];
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "You greet people.");
        assert_eq!(messages[1]["content"], "hey");
        assert_eq!(tools.as_ref().unwrap()[0]["function"]["name"], "greet");
    }

    #[tokio::test]
    async fn test_tools_withheld_without_function_calling() {
        let llm = Arc::new(
            ScriptedLLM::new(vec![Value::String("plain".into())]).without_function_calling(),
        );
        let agent = greet_agent(llm.clone());
        let result = agent.run("hey", deps()).await.unwrap();
        assert_eq!(result.data, "plain");

        let requests = llm.requests.lock();
        assert!(requests[0].1.is_none());
        assert_eq!(agent.tool_names(), vec!["greet"]);
    }

    #[tokio::test]
    async fn test_tool_calls_are_executed() {
        let llm = Arc::new(ScriptedLLM::new(vec![
            ScriptedLLM::tool_call("call_1", "greet", serde_json::json!({"name": "Ada"})),
            Value::String("Done".into()),
        ]));
        let agent = greet_agent(llm.clone());
        let result = agent.run("greet Ada", deps()).await.unwrap();
        assert_eq!(result.data, "Done");
        assert_eq!(result.iterations, 2);

        let requests = llm.requests.lock();
        let (second, _) = &requests[1];
        assert_eq!(second.len(), 4);
        assert_eq!(second[2]["role"], "assistant");
        assert_eq!(second[3]["role"], "tool");
        assert_eq!(second[3]["tool_call_id"], "call_1");
        assert_eq!(second[3]["content"], "Hello, Ada!");
    }

    #[tokio::test]
    async fn test_tool_failures_reported_in_band() {
        let llm = Arc::new(ScriptedLLM::new(vec![
            ScriptedLLM::tool_call("c1", "missing", serde_json::json!({})),
            ScriptedLLM::tool_call("c2", "greet", serde_json::json!({"wrong": 1})),
            Value::String("ok".into()),
        ]));
        let agent = greet_agent(llm.clone());
        agent.run("x", deps()).await.unwrap();

        let requests = llm.requests.lock();
        let (last, _) = &requests[2];
        let unknown = last[3]["content"].as_str().unwrap();
        assert!(unknown.contains("Tool not found: missing"));
        let invalid = last[5]["content"].as_str().unwrap();
        assert!(invalid.contains("Invalid arguments"));
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let replies = (0..3)
            .map(|i| {
                let args = serde_json::json!({"name": "x"});
                ScriptedLLM::tool_call(&format!("c{}", i), "greet", args)
            })
            .collect();
        let agent = greet_agent(Arc::new(ScriptedLLM::new(replies))).with_max_iter(2);
        let err = agent.run("loop", deps()).await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterationsExceeded(2)));
    }

    #[tokio::test]
    async fn test_llm_error_surfaces() {
        let agent = greet_agent(Arc::new(ScriptedLLM::new(vec![])));
        let err = agent.run("x", deps()).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(ref msg) if msg.contains("script exhausted")));
    }

    #[tokio::test]
    async fn test_call_tool_directly() {
        let agent = greet_agent(Arc::new(ScriptedLLM::new(vec![])));
        let out = agent
            .call_tool("greet", deps(), serde_json::json!({"name": "Bo"}))
            .await
            .unwrap();
        assert_eq!(out, Value::String("Hello, Bo!".into()));

        assert!(matches!(
            agent.call_tool("nope", deps(), Value::Null).await,
            Err(AgentError::ToolNotFound(_))
        ));
        assert!(matches!(
            agent.call_tool("greet", deps(), serde_json::json!({})).await,
            Err(AgentError::Tool { .. })
        ));
    }

    #[test]
    fn test_registration_replaces_same_name() {
        let mut agent = greet_agent(Arc::new(ScriptedLLM::new(vec![])));
        agent.tool("greet", "again", serde_json::json!({}), |_ctx, _args| async {
            Ok(Value::Null)
        });
        assert_eq!(agent.tool_names(), vec!["greet"]);
        assert_eq!(agent.tool_schemas()[0]["function"]["description"], "again");
        assert_eq!(agent.max_iter(), DEFAULT_MAX_ITER);
        assert!(agent.mcp_servers.is_empty());
    }
}
