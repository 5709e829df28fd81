//! Source generation for agents wired to capability servers.
//!
//! Rendering goes through `tera`. Every value taken from configuration is
//! emitted as an escaped Rust string literal, and the agent name must
//! already be a valid identifier, so the generated text cannot be broken
//! out of by a hostile name or argument.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tera::{Context, Tera};

use super::config::CapabilityConfig;
use super::error::McpError;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Template used when no template file is supplied.
pub const DEFAULT_TEMPLATE: &str = r#"//! {{ agent_name }} agent wired to MCP capability servers.
//!
//! Generated by agent-builder.

use std::collections::HashMap;
use std::sync::Arc;

use agent_builder::agent::Agent;
use agent_builder::llms::providers::openai::OpenAICompletion;
use agent_builder::mcp::{CapabilityConfig, CapabilityRegistry, TransportHandle};

#[derive(Debug, Clone)]
pub struct {{ deps_type }} {
    pub api_key: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Create agent
    let llm = OpenAICompletion::new("gpt-4", std::env::var("OPENAI_API_KEY").ok(), None);
    let mut {{ agent_ident }}_agent: Agent<{{ deps_type }}> = Agent::new(
        Arc::new(llm),
        "You are an AI assistant with MCP server integration.",
    );

    // Connect to MCP servers
    let registry = CapabilityRegistry::new();
    let mut mcp_servers: Vec<TransportHandle> = Vec::new();
{{ mcp_connections }}
    {{ agent_ident }}_agent.mcp_servers.extend(mcp_servers);

    // Run agent
    let deps = {{ deps_type }} {
        api_key: "your-api-key".to_string(),
    };
    let result = {{ agent_ident }}_agent.run("Hello!", deps).await?;
    println!("{}", result.data);
    Ok(())
}
"#;

/// Per-capability connection snippet spliced into `mcp_connections`.
const CONNECTION_SNIPPET: &str = r#"
    // Connect to {{ cap.name_literal }}
    let {{ cap.ident }}_server = registry.create_server(
        {{ cap.name_literal }},
        Some(
            &CapabilityConfig::new({{ cap.server_name_literal }}, {{ cap.command_literal }})
                .with_args({{ cap.args_expr }})
                .with_env({{ cap.env_expr }}),
        ),
    )?;
    mcp_servers.push({{ cap.ident }}_server);
"#;

/// Template view of one capability.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityContext {
    /// Registry key, verbatim and unescaped. Not used by the built-in
    /// templates.
    pub name: String,
    /// Registry key turned into an identifier.
    pub ident: String,
    pub name_literal: String,
    pub server_name_literal: String,
    pub command: String,
    pub command_literal: String,
    pub args: Vec<String>,
    pub args_expr: String,
    pub env_keys: Vec<String>,
    pub env_expr: String,
    pub description: String,
}

/// Quote a value as a Rust string literal.
fn rust_literal(value: &str) -> String {
    format!("{:?}", value)
}

/// Turn an arbitrary key into something usable as a Rust identifier fragment.
pub fn sanitize_identifier(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

/// Check that `name` can be spliced into source as an identifier.
pub fn validate_identifier(name: &str) -> Result<(), McpError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(McpError::InvalidIdentifier(name.to_string()))
    }
}

impl CapabilityContext {
    fn new(key: &str, config: &CapabilityConfig) -> Self {
        let args_expr = if config.args.is_empty() {
            "Vec::new()".to_string()
        } else {
            let items: Vec<String> = config
                .args
                .iter()
                .map(|arg| format!("{}.to_string()", rust_literal(arg)))
                .collect();
            format!("vec![{}]", items.join(", "))
        };

        let env_expr = if config.env.is_empty() {
            "HashMap::new()".to_string()
        } else {
            let items: Vec<String> = config
                .env
                .keys()
                .map(|k| {
                    let key = rust_literal(k);
                    format!("({key}.to_string(), std::env::var({key}).unwrap_or_default())")
                })
                .collect();
            format!("HashMap::from([{}])", items.join(", "))
        };

        Self {
            name: key.to_string(),
            ident: sanitize_identifier(key),
            name_literal: rust_literal(key),
            server_name_literal: rust_literal(&config.name),
            command: config.command.clone(),
            command_literal: rust_literal(&config.command),
            args: config.args.clone(),
            args_expr,
            env_keys: config.env.keys().cloned().collect(),
            env_expr,
            description: config.description.clone(),
        }
    }
}

/// Render integration source for `agent_name` using `configs` as the lookup
/// table for `server_names`.
///
/// # Errors
///
/// * [`McpError::InvalidIdentifier`] when `agent_name` is not an identifier.
/// * [`McpError::UnknownCapability`] when a name is missing from `configs`.
/// * [`McpError::Template`] when the template does not parse or render.
pub fn render_integration_code(
    configs: &BTreeMap<String, CapabilityConfig>,
    agent_name: &str,
    server_names: &[String],
    template: Option<&str>,
) -> Result<String, McpError> {
    validate_identifier(agent_name)?;

    let capabilities = server_names
        .iter()
        .map(|name| {
            configs
                .get(name)
                .map(|config| CapabilityContext::new(name, config))
                .ok_or_else(|| McpError::UnknownCapability(name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut connections = Vec::with_capacity(capabilities.len());
    for cap in &capabilities {
        let mut snippet_ctx = Context::new();
        snippet_ctx.insert("cap", cap);
        connections.push(Tera::one_off(CONNECTION_SNIPPET, &snippet_ctx, false)?);
    }

    let mut context = Context::new();
    context.insert("agent_name", agent_name);
    context.insert("agent_ident", &agent_name.to_lowercase());
    context.insert("deps_type", &format!("{}Deps", agent_name));
    context.insert("mcp_connections", &connections.join("\n"));
    context.insert("capabilities", &capabilities);

    Ok(Tera::one_off(
        template.unwrap_or(DEFAULT_TEMPLATE),
        &context,
        false,
    )?)
}
