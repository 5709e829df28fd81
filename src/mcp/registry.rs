//! Capability registry: resolves capability names to launch configurations,
//! creates transport handles and attaches them to agents.
//!
//! The registry holds three layers:
//! 1. Built-in capabilities (see [`default_mcp_configs`])
//! 2. User capabilities loaded from a JSON file, shadowing built-ins by name
//! 3. A cache of transport handles created through it, keyed by name

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codegen::render_integration_code;
use super::config::{default_mcp_configs, CapabilityConfig};
use super::error::McpError;
use super::transports::{BaseTransport, StdioTransport};
use crate::agent::Agent;
use crate::utilities::file_handler::FileHandler;

// ---------------------------------------------------------------------------
// TransportHandle
// ---------------------------------------------------------------------------

/// Shared handle to a capability server transport.
///
/// Cloning is cheap; all clones drive the same process. The process is only
/// started when [`BaseTransport::connect`] is called on the transport.
#[derive(Clone)]
pub struct TransportHandle {
    name: String,
    transport: Arc<StdioTransport>,
}

impl TransportHandle {
    fn new(name: impl Into<String>, transport: StdioTransport) -> Self {
        Self {
            name: name.into(),
            transport: Arc::new(transport),
        }
    }

    /// Capability name this handle was created for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying transport.
    pub fn transport(&self) -> &StdioTransport {
        &self.transport
    }

    /// Identifier of the underlying transport.
    pub fn server_identifier(&self) -> String {
        self.transport.server_identifier()
    }

    /// Whether two handles drive the same transport.
    pub fn same_transport(&self, other: &TransportHandle) -> bool {
        Arc::ptr_eq(&self.transport, &other.transport)
    }
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("name", &self.name)
            .field("transport", &self.transport)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Reports and descriptors
// ---------------------------------------------------------------------------

/// Outcome of [`CapabilityRegistry::connect_agent_to_servers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachReport {
    /// Names attached to the agent, in request order.
    pub attached: Vec<String>,
    /// Names that failed, with the reason.
    pub failed: BTreeMap<String, String>,
}

impl AttachReport {
    /// Whether every requested name was attached.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Tool metadata reported for a capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

// ---------------------------------------------------------------------------
// CapabilityRegistry
// ---------------------------------------------------------------------------

/// Registry of capability servers available to agents.
///
/// # Example
///
/// ```rust
/// use agent_builder::mcp::{CapabilityRegistry, McpError};
///
/// let registry = CapabilityRegistry::new();
/// assert!(registry.available_servers().contains_key("filesystem"));
/// assert!(matches!(
///     registry.create_server("nope", None),
///     Err(McpError::UnknownCapability(_))
/// ));
/// ```
pub struct CapabilityRegistry {
    config_path: Option<PathBuf>,
    builtin_configs: BTreeMap<String, CapabilityConfig>,
    custom_configs: BTreeMap<String, CapabilityConfig>,
    active_servers: Mutex<HashMap<String, TransportHandle>>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("config_path", &self.config_path)
            .field("builtin", &self.builtin_configs.keys().collect::<Vec<_>>())
            .field("custom", &self.custom_configs.keys().collect::<Vec<_>>())
            .field("active", &self.active_server_names())
            .finish()
    }
}

impl CapabilityRegistry {
    /// Create a registry with the built-in capabilities only.
    pub fn new() -> Self {
        Self {
            config_path: None,
            builtin_configs: default_mcp_configs(),
            custom_configs: BTreeMap::new(),
            active_servers: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry and load user capabilities from `config_path`.
    ///
    /// A missing file yields no user capabilities. A file that cannot be
    /// read or parsed is logged and also yields none.
    pub fn with_config_path(config_path: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new();
        let path = config_path.into();
        registry.custom_configs = Self::load_custom_configs(&path);
        registry.config_path = Some(path);
        registry
    }

    /// Path the user capabilities were loaded from, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Read user capabilities from a file, tolerating absence and errors.
    pub fn load_custom_configs(path: &Path) -> BTreeMap<String, CapabilityConfig> {
        if !path.exists() {
            return BTreeMap::new();
        }

        match Self::load_agent_config(path) {
            Ok(configs) => {
                log::debug!(
                    "Loaded {} custom MCP configs from {}",
                    configs.len(),
                    path.display()
                );
                configs
            }
            Err(e) => {
                log::error!("Error loading custom configs: {}", e);
                BTreeMap::new()
            }
        }
    }

    /// All available capabilities. User entries replace built-ins with the
    /// same name.
    pub fn available_servers(&self) -> BTreeMap<String, CapabilityConfig> {
        let mut servers = self.builtin_configs.clone();
        servers.extend(
            self.custom_configs
                .iter()
                .map(|(name, config)| (name.clone(), config.clone())),
        );
        servers
    }

    /// Create a transport handle for a capability.
    ///
    /// `config` takes precedence over the registry lookup. The configured
    /// environment is merged over the current process environment.
    ///
    /// # Errors
    ///
    /// * [`McpError::UnknownCapability`] when no override is given and the
    ///   name is not registered.
    /// * [`McpError::TransportConstruction`] when the configuration has no
    ///   command to launch.
    pub fn create_server(
        &self,
        server_name: &str,
        config: Option<&CapabilityConfig>,
    ) -> Result<TransportHandle, McpError> {
        let resolved;
        let config = match config {
            Some(config) => config,
            None => {
                resolved = self
                    .custom_configs
                    .get(server_name)
                    .or_else(|| self.builtin_configs.get(server_name))
                    .cloned()
                    .ok_or_else(|| McpError::UnknownCapability(server_name.to_string()))?;
                &resolved
            }
        };

        if config.command.trim().is_empty() {
            return Err(McpError::TransportConstruction {
                name: server_name.to_string(),
                reason: "command is empty".to_string(),
            });
        }

        let full_env = config.merged_env(std::env::vars_os());
        let transport =
            StdioTransport::new(&config.command, Some(config.args.clone()), Some(full_env));
        Ok(TransportHandle::new(server_name, transport))
    }

    /// Attach capability servers to an agent.
    ///
    /// Each name is handled independently: a handle is created, cached and
    /// pushed onto `agent.mcp_servers`. A failing name is logged, recorded in
    /// the report and skipped; the call itself never fails.
    pub fn connect_agent_to_servers<D, S>(
        &self,
        agent: &mut Agent<D>,
        server_names: &[S],
    ) -> AttachReport
    where
        D: Send + Sync + 'static,
        S: AsRef<str>,
    {
        let mut report = AttachReport::default();

        for server_name in server_names {
            let server_name = server_name.as_ref();
            match self.create_server(server_name, None) {
                Ok(handle) => {
                    self.active_servers
                        .lock()
                        .insert(server_name.to_string(), handle.clone());
                    agent.mcp_servers.push(handle);
                    report.attached.push(server_name.to_string());
                    log::info!("Successfully connected to {} MCP server", server_name);
                }
                Err(e) => {
                    log::warn!("Failed to connect to {}: {}", server_name, e);
                    report.failed.insert(server_name.to_string(), e.to_string());
                }
            }
        }

        report
    }

    /// Cached handle for `server_name`, if one has been created through the
    /// registry.
    pub fn active_handle(&self, server_name: &str) -> Option<TransportHandle> {
        self.active_servers.lock().get(server_name).cloned()
    }

    /// Names with a cached handle, sorted.
    pub fn active_server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.active_servers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// List the tools of a capability.
    ///
    /// Reuses the cached handle or creates and caches one. Tool discovery
    /// over the wire is not implemented: the result is a single placeholder
    /// descriptor named `<server>_tool` and must not be used for real
    /// discovery.
    pub fn list_server_tools(&self, server_name: &str) -> Result<Vec<ToolDescriptor>, McpError> {
        {
            let mut active = self.active_servers.lock();
            if !active.contains_key(server_name) {
                let handle = self.create_server(server_name, None)?;
                active.insert(server_name.to_string(), handle);
            }
        }

        Ok(vec![ToolDescriptor {
            name: format!("{}_tool", server_name),
            description: format!("Tool from {} server", server_name),
            parameters: Value::Object(serde_json::Map::new()),
        }])
    }

    /// Write `server_configs` to `<output_dir>/<agent_name>_mcp_config.json`.
    ///
    /// Creates the directory if needed and overwrites an existing file.
    /// Returns the path written.
    pub fn save_agent_config(
        agent_name: &str,
        server_configs: &BTreeMap<String, CapabilityConfig>,
        output_dir: impl AsRef<Path>,
    ) -> Result<PathBuf, McpError> {
        let handler = FileHandler::new(output_dir.as_ref());
        let config_file = handler.save(&format!("{}_mcp_config.json", agent_name), server_configs)?;
        log::info!("Saved MCP configuration to {}", config_file.display());
        Ok(config_file)
    }

    /// Load a capability configuration file.
    ///
    /// # Errors
    ///
    /// * [`McpError::ConfigNotFound`] if `config_file` does not exist.
    /// * [`McpError::Json`] if it is not a valid configuration mapping.
    pub fn load_agent_config(
        config_file: impl AsRef<Path>,
    ) -> Result<BTreeMap<String, CapabilityConfig>, McpError> {
        let path = config_file.as_ref();
        if !path.exists() {
            return Err(McpError::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Check that a handle can be constructed for `server_name`.
    ///
    /// This does not start the process or verify that it answers.
    pub fn test_connection(&self, server_name: &str) -> bool {
        match self.create_server(server_name, None) {
            Ok(_) => true,
            Err(e) => {
                log::error!("Connection test failed for {}: {}", server_name, e);
                false
            }
        }
    }

    /// Generate agent source wired to the given built-in capabilities.
    ///
    /// If `template_path` names an existing file it is used as the `tera`
    /// template; otherwise the built-in template is used. Only built-in
    /// capabilities can be generated.
    pub fn generate_integration_code<S: AsRef<str>>(
        &self,
        agent_name: &str,
        server_names: &[S],
        template_path: Option<&Path>,
    ) -> Result<String, McpError> {
        let template = match template_path {
            Some(path) if path.exists() => Some(std::fs::read_to_string(path)?),
            Some(path) => {
                log::warn!(
                    "Template {} not found, using the built-in template",
                    path.display()
                );
                None
            }
            None => None,
        };

        let names: Vec<String> = server_names.iter().map(|s| s.as_ref().to_string()).collect();
        render_integration_code(&self.builtin_configs, agent_name, &names, template.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
