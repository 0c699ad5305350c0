use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Default config location for a system-wide install.
const DEFAULT_CONFIG_PATH: &str = "/etc/opsgate/config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where this config was loaded from (not serialized)
    #[serde(skip)]
    pub path: PathBuf,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub exec: ExecConfig,

    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Allow/deny lists compiled into a `Policy` at startup.
///
/// Immutable for the process lifetime: edits here take effect on restart,
/// never mid-flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Path prefixes the gateway may read, write, list, or use as a
    /// working directory.
    #[serde(default)]
    pub allowed_paths: Vec<String>,

    /// Path prefixes that are always refused, even inside an allowed
    /// prefix.
    #[serde(default)]
    pub denied_paths: Vec<String>,

    /// Executable basenames that may be spawned.
    #[serde(default)]
    pub allowed_commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Default command timeout in seconds
    #[serde(default = "default_exec_timeout")]
    pub timeout_secs: u64,

    /// Ceiling for per-request timeout overrides
    #[serde(default = "default_exec_max_timeout")]
    pub max_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Root directory application trees are copied into
    #[serde(default = "default_deploy_root")]
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// systemd units probed by health_check (empty = none)
    #[serde(default)]
    pub services: Vec<String>,

    /// Timeout for each is-active probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

// Default value functions
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_exec_timeout() -> u64 {
    30
}
fn default_exec_max_timeout() -> u64 {
    600
}
fn default_deploy_root() -> String {
    "/var/deployment".to_string()
}
fn default_probe_timeout() -> u64 {
    5
}
fn default_allowed_paths() -> Vec<String> {
    vec![
        "/srv".to_string(),
        "/var/www".to_string(),
        "/tmp".to_string(),
    ]
}
fn default_allowed_commands() -> Vec<String> {
    [
        "ls", "pwd", "cat", "echo", "grep", "find", "docker", "systemctl", "service", "ps",
        "netstat",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_paths: default_allowed_paths(),
            denied_paths: Vec::new(),
            allowed_commands: default_allowed_commands(),
        }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_exec_timeout(),
            max_timeout_secs: default_exec_max_timeout(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            root: default_deploy_root(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl Config {
    /// Load configuration, resolving the file location in order:
    /// explicit `--config` argument, `OPSGATE_CONFIG` env var, then the
    /// system default. A missing file yields the built-in defaults.
    pub fn load(override_path: Option<&str>) -> Result<Self> {
        let path = Self::resolve_path(override_path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config {
                path,
                ..Config::default()
            });
        }

        let content = fs::read_to_string(&path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.path = path;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&self.path, content)?;

        Ok(())
    }

    pub fn resolve_path(override_path: Option<&str>) -> PathBuf {
        let raw = override_path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("OPSGATE_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        PathBuf::from(shellexpand::tilde(&raw).to_string())
    }

    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["server", "bind"] => Ok(self.server.bind.clone()),
            ["server", "port"] => Ok(self.server.port.to_string()),
            ["exec", "timeout_secs"] => Ok(self.exec.timeout_secs.to_string()),
            ["exec", "max_timeout_secs"] => Ok(self.exec.max_timeout_secs.to_string()),
            ["deploy", "root"] => Ok(self.deploy.root.clone()),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["server", "bind"] => self.server.bind = value.to_string(),
            ["server", "port"] => self.server.port = value.parse()?,
            ["exec", "timeout_secs"] => self.exec.timeout_secs = value.parse()?,
            ["exec", "max_timeout_secs"] => self.exec.max_timeout_secs = value.parse()?,
            ["deploy", "root"] => self.deploy.root = value.to_string(),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        Ok(())
    }
}

/// Default config template with helpful comments (written by `config init`)
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# opsgate configuration
# The gateway re-reads this file only on restart.

[server]
# The gateway speaks plain HTTP and carries no authentication of its own;
# bind to an interface your network boundary actually protects.
bind = "0.0.0.0"
port = 8080

[policy]
# Path prefixes requests may touch. Deny wins over allow on overlap;
# anything matching neither list is refused.
allowed_paths = ["/srv", "/var/www", "/tmp"]
denied_paths = []

# Executable basenames that may be spawned. Only the first token of a
# command line is checked; arguments are not inspected.
allowed_commands = [
    "ls", "pwd", "cat", "echo", "grep", "find",
    "docker", "systemctl", "service", "ps", "netstat",
]

[exec]
# Default and maximum wall-clock bounds for spawned commands. Callers may
# raise the timeout per request (e.g. package installs) up to the maximum.
timeout_secs = 30
max_timeout_secs = 600

[deploy]
# deploy_application copies trees into <root>/<app>
root = "/var/deployment"

[health]
# systemd units reported by health_check, e.g. ["nginx", "docker"]
services = []
probe_timeout_secs = 5
"#;
