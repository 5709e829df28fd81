//! Stdio transport for capability servers running as local processes.

use std::collections::HashMap;
use std::ffi::OsString;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::mcp::transports::BaseTransport;

/// Streams of a running server process.
struct StdioSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Stdio transport for connecting to local capability servers.
///
/// Construction never starts a process; [`BaseTransport::connect`] does.
/// The process is started with exactly `env` as its environment, so callers
/// pass the already merged environment.
pub struct StdioTransport {
    /// Command to execute (e.g., "python", "node", "npx").
    pub command: String,
    /// Command arguments (e.g., vec!["server.py"] or vec!["-y", "@mcp/server"]).
    pub args: Vec<String>,
    /// Complete environment of the child process.
    pub env: HashMap<OsString, OsString>,
    is_connected: AtomicBool,
    session: Mutex<Option<StdioSession>>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Environment values may carry credentials.
        f.debug_struct("StdioTransport")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env_keys", &self.env.len())
            .field("connected", &self.connected())
            .finish()
    }
}

impl StdioTransport {
    /// Create a new StdioTransport.
    ///
    /// # Arguments
    /// * `command` - Command to execute.
    /// * `args` - Command arguments.
    /// * `env` - Full environment of the child process.
    pub fn new(
        command: &str,
        args: Option<Vec<String>>,
        env: Option<HashMap<OsString, OsString>>,
    ) -> Self {
        Self {
            command: command.to_string(),
            args: args.unwrap_or_default(),
            env: env.unwrap_or_default(),
            is_connected: AtomicBool::new(false),
            session: Mutex::new(None),
        }
    }
}

#[async_trait]
impl BaseTransport for StdioTransport {
    fn connected(&self) -> bool {
        self.is_connected.load(Ordering::Acquire)
    }

    async fn connect(&self) -> Result<(), anyhow::Error> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .env_clear()
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|e| {
            anyhow::anyhow!(
                "Failed to start MCP server process '{}': {}",
                self.command,
                e
            )
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow::anyhow!("MCP server process '{}' has no stdin", self.command))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("MCP server process '{}' has no stdout", self.command))?;

        *session = Some(StdioSession {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        });
        self.is_connected.store(true, Ordering::Release);

        log::info!(
            "Stdio transport connected: {} {}",
            self.command,
            self.args.join(" ")
        );

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), anyhow::Error> {
        let mut session = self.session.lock().await;
        let Some(mut running) = session.take() else {
            return Ok(());
        };
        self.is_connected.store(false, Ordering::Release);

        drop(running.stdin);
        if let Err(e) = running.child.kill().await {
            log::warn!("Failed to kill MCP server process '{}': {}", self.command, e);
        }

        log::info!(
            "Stdio transport disconnected: {} {}",
            self.command,
            self.args.join(" ")
        );

        Ok(())
    }

    async fn send_message(&self, message: &Value) -> Result<(), anyhow::Error> {
        let mut session = self.session.lock().await;
        let running = session
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Transport not connected. Call connect() first."))?;

        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        running.stdin.write_all(line.as_bytes()).await?;
        running.stdin.flush().await?;
        Ok(())
    }

    async fn receive_message(&self) -> Result<Value, anyhow::Error> {
        let mut session = self.session.lock().await;
        let running = session
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("Transport not connected. Call connect() first."))?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = running.stdout.read_line(&mut line).await?;
            if read == 0 {
                return Err(anyhow::anyhow!(
                    "MCP server process '{}' closed its output stream",
                    self.command
                ));
            }
            if !line.trim().is_empty() {
                break;
            }
        }

        Ok(serde_json::from_str(line.trim_end())?)
    }

    fn server_identifier(&self) -> String {
        format!("stdio:{}:{}", self.command, self.args.join(":"))
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(running) = self.session.get_mut().as_mut() {
            // Best-effort kill on drop
            let _ = running.child.start_kill();
        }
    }
}
