//! Base tool definitions.
//!
//! Provides the `BaseTool` trait agents call through, and the concrete
//! `Tool` struct that wraps an async callable.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::agent::RunContext;

// ---------------------------------------------------------------------------
// ToolError
// ---------------------------------------------------------------------------

/// Errors a tool can report back to the agent.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The arguments did not match the tool's parameter schema.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran and failed.
    #[error("Tool execution failed: {0}")]
    Execution(String),
}

/// Deserialize tool arguments into a typed struct.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// An empty JSON-schema object for tools without parameters.
pub fn empty_parameters() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

// ---------------------------------------------------------------------------
// BaseTool trait
// ---------------------------------------------------------------------------

/// Interface for tools an agent can call.
///
/// `D` is the dependency type the agent is run with; tools see it through
/// the [`RunContext`].
#[async_trait]
pub trait BaseTool<D>: Send + Sync + fmt::Debug
where
    D: Send + Sync + 'static,
{
    /// The unique name of the tool that clearly communicates its purpose.
    fn name(&self) -> &str;

    /// Description used to tell the model how/when/why to use the tool.
    fn description(&self) -> &str;

    /// JSON schema for the arguments that the tool accepts.
    fn args_schema(&self) -> Value {
        empty_parameters()
    }

    /// The tool in OpenAI function-calling format.
    fn to_function_schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name(),
                "description": self.description(),
                "parameters": self.args_schema(),
            }
        })
    }

    /// Execute the tool.
    async fn run(&self, ctx: RunContext<D>, args: Value) -> Result<Value, ToolError>;
}

// ---------------------------------------------------------------------------
// Tool struct (wraps a callable function)
// ---------------------------------------------------------------------------

/// Type alias for a stored async tool function.
pub type ToolFn<D> =
    Arc<dyn Fn(RunContext<D>, Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// Concrete tool that wraps an async function.
pub struct Tool<D> {
    tool_name: String,
    tool_description: String,
    tool_args_schema: Value,
    /// The wrapped function.
    pub func: ToolFn<D>,
}

impl<D> Clone for Tool<D> {
    fn clone(&self) -> Self {
        Self {
            tool_name: self.tool_name.clone(),
            tool_description: self.tool_description.clone(),
            tool_args_schema: self.tool_args_schema.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<D> fmt::Debug for Tool<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.tool_name)
            .field("description", &self.tool_description)
            .finish()
    }
}

impl<D: Send + Sync + 'static> Tool<D> {
    /// Create a new Tool wrapping the given async function.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(RunContext<D>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self {
            tool_name: name.into(),
            tool_description: description.into(),
            tool_args_schema: empty_parameters(),
            func: Arc::new(move |ctx, args| func(ctx, args).boxed()),
        }
    }

    /// Builder method to set the args schema.
    pub fn with_args_schema(mut self, schema: Value) -> Self {
        self.tool_args_schema = schema;
        self
    }
}

#[async_trait]
impl<D: Send + Sync + 'static> BaseTool<D> for Tool<D> {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.tool_description
    }

    fn args_schema(&self) -> Value {
        self.tool_args_schema.clone()
    }

    async fn run(&self, ctx: RunContext<D>, args: Value) -> Result<Value, ToolError> {
        (self.func)(ctx, args).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct AddArgs {
        a: i64,
        b: i64,
    }

    fn ctx() -> RunContext<u32> {
        RunContext::new(Arc::new(7), "test-model", None)
    }

    fn add_tool() -> Tool<u32> {
        Tool::new("add", "Add two numbers", |ctx: RunContext<u32>, args| async move {
            let args: AddArgs = parse_args(args)?;
            Ok(serde_json::json!(args.a + args.b + i64::from(*ctx.deps)))
        })
        .with_args_schema(serde_json::json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
            "required": ["a", "b"]
        }))
    }

    #[tokio::test]
    async fn test_tool_run_sees_deps() {
        let tool = add_tool();
        let out = tool.run(ctx(), serde_json::json!({"a": 1, "b": 2})).await.unwrap();
        assert_eq!(out, serde_json::json!(10));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let tool = add_tool();
        let err = tool.run(ctx(), serde_json::json!({"a": "x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn test_function_schema() {
        let schema = add_tool().to_function_schema();
        assert_eq!(schema["type"], "function");
        assert_eq!(schema["function"]["name"], "add");
        assert_eq!(schema["function"]["parameters"]["required"][0], "a");
    }

    #[test]
    fn test_clone_shares_function() {
        let tool = add_tool();
        let copy = tool.clone();
        assert!(Arc::ptr_eq(&tool.func, &copy.func));
        assert_eq!(format!("{:?}", copy), format!("{:?}", tool));
    }
}
