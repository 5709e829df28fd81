//! CLI module for agent-builder commands.
//!
//! Provides command-line access to the capability registry and the page
//! fetch/extract tools. Parsing and execution live here so the binary stays
//! a thin wrapper.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::mcp::{CapabilityConfig, CapabilityRegistry, McpError};
use crate::tools::web_scraping::{extract_text, fetch_webpage, DEFAULT_FETCH_TIMEOUT_SECS};

/// Environment variable naming the default user capability file.
pub const CONFIG_ENV: &str = "AGENT_BUILDER_CONFIG";

/// agent-builder - capability registry and page tools for LLM agents.
#[derive(Parser, Debug)]
#[command(name = "agent-builder", version, about, long_about = None)]
pub struct Cli {
    /// User capability file; its entries shadow built-ins by name.
    #[arg(long, global = true, env = CONFIG_ENV, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List available capability servers.
    #[command(alias = "list")]
    Servers,
    /// Check that capability handles can be constructed.
    Test {
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
    /// Print the tools of a capability server as JSON.
    Tools { name: String },
    /// Print agent source wired to built-in servers.
    Generate {
        agent: String,
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
        /// Tera template file; the built-in template is used if it is missing.
        #[arg(long, value_name = "PATH")]
        template: Option<PathBuf>,
    },
    /// Write the selected server configs to `<DIR>/<AGENT>_mcp_config.json`.
    Save {
        agent: String,
        dir: PathBuf,
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
    /// Fetch a page and print its readable text.
    Fetch {
        url: String,
        /// Request timeout in seconds.
        #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
        timeout: u64,
    },
    /// Show version information.
    Version,
}

impl Commands {
    /// Subcommand name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Servers => "servers",
            Self::Test { .. } => "test",
            Self::Tools { .. } => "tools",
            Self::Generate { .. } => "generate",
            Self::Save { .. } => "save",
            Self::Fetch { .. } => "fetch",
            Self::Version => "version",
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Registry for a command line: `--config` (or `AGENT_BUILDER_CONFIG`),
/// else built-ins only.
pub fn build_registry(cli: &Cli) -> CapabilityRegistry {
    match &cli.config {
        Some(path) => CapabilityRegistry::with_config_path(path.clone()),
        None => CapabilityRegistry::new(),
    }
}

fn format_server(name: &str, config: &CapabilityConfig) -> String {
    let mut line = format!("{:<16} {}", name, config.name);
    if !config.description.is_empty() {
        line.push_str(&format!(" - {}", config.description));
    }
    line.push_str(&format!("\n{:<16} $ {} {}", "", config.command, config.args.join(" ")));
    line
}

/// Run a parsed command line and return the text to print.
pub async fn execute(cli: &Cli) -> anyhow::Result<String> {
    log::debug!("Executing command: {}", cli.command.name());

    match &cli.command {
        Commands::Servers => {
            let registry = build_registry(cli);
            let lines: Vec<String> = registry
                .available_servers()
                .iter()
                .map(|(name, config)| format_server(name, config))
                .collect();
            Ok(lines.join("\n"))
        }
        Commands::Test { names } => {
            let registry = build_registry(cli);
            let mut failed = 0;
            let mut lines = Vec::with_capacity(names.len());
            for name in names {
                let ok = registry.test_connection(name);
                if !ok {
                    failed += 1;
                }
                lines.push(format!("{}: {}", name, if ok { "ok" } else { "FAILED" }));
            }
            if failed > 0 {
                anyhow::bail!(
                    "{}\n{} of {} checks failed",
                    lines.join("\n"),
                    failed,
                    lines.len()
                );
            }
            Ok(lines.join("\n"))
        }
        Commands::Tools { name } => {
            let registry = build_registry(cli);
            let tools = registry.list_server_tools(name)?;
            Ok(serde_json::to_string_pretty(&tools)?)
        }
        Commands::Generate {
            agent,
            names,
            template,
        } => {
            let registry = build_registry(cli);
            Ok(registry.generate_integration_code(agent, names, template.as_deref())?)
        }
        Commands::Save { agent, dir, names } => {
            let registry = build_registry(cli);
            let available = registry.available_servers();

            let mut selected = BTreeMap::new();
            for name in names {
                let config = available
                    .get(name)
                    .ok_or_else(|| McpError::UnknownCapability(name.clone()))?;
                selected.insert(name.clone(), config.clone());
            }

            let path = CapabilityRegistry::save_agent_config(agent, &selected, dir)?;
            Ok(format!(
                "Saved {} server config(s) to {}",
                selected.len(),
                path.display()
            ))
        }
        Commands::Fetch { url, timeout } => {
            let body = fetch_webpage(url, *timeout).await;
            if body.starts_with("Error fetching ") {
                anyhow::bail!(body);
            }
            Ok(extract_text(&body))
        }
        Commands::Version => Ok(format!("agent-builder {}", env!("CARGO_PKG_VERSION"))),
    }
}
