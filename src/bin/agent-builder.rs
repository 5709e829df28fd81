//! agent-builder command-line binary.
//!
//! Thin wrapper over [`agent_builder::cli`]: installs logging, parses the
//! command line and prints the command's output.
//!
//! # Environment Variables
//!
//! - `AGENT_BUILDER_CONFIG`: user capability file (default for `--config`)
//! - `POSTGRES_URL`, `BRAVE_API_KEY`: values for the built-in servers
//! - `RUST_LOG`: Tracing filter (default: "info,agent_builder=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin agent-builder -- servers
//! cargo run --bin agent-builder -- generate ResearchAgent filesystem brave
//! ```

use agent_builder::cli::{self, Cli};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; also forwards `log` records from the library
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agent_builder=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(command = cli.command.name(), "running command");

    let output = cli::execute(&cli).await?;
    println!("{}", output);
    Ok(())
}
