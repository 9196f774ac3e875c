//! stormctl.toml configuration
//!
//! Parses and validates the project config file. It names the directory of
//! topology definitions, the virtualenv specification directory, and one
//! `[envs.<name>]` table per deployment environment (Nimbus coordinator,
//! SSH and virtualenv policy, log routing).

mod log;

pub use log::LogSettings;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "stormctl.toml";

/// Default Nimbus Thrift port
pub const DEFAULT_NIMBUS_PORT: u16 = 6627;

/// File extension of topology definitions under `topology_specs`
const TOPOLOGY_EXTENSION: &str = "clj";

/// Project configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Schema version for forward compatibility
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Directory holding topology definition files (`<name>.clj`)
    #[serde(default = "default_topology_specs")]
    pub topology_specs: PathBuf,

    /// Directory holding per-topology virtualenv requirement files
    #[serde(default = "default_virtualenv_specs")]
    pub virtualenv_specs: PathBuf,

    /// Deployment environments by name
    #[serde(default)]
    pub envs: BTreeMap<String, EnvConfig>,

    /// Optional pre/post submit hook commands
    #[serde(default)]
    pub hooks: HooksConfig,
}

fn default_schema_version() -> u32 {
    1
}

fn default_topology_specs() -> PathBuf {
    PathBuf::from("topologies")
}

fn default_virtualenv_specs() -> PathBuf {
    PathBuf::from("virtualenvs")
}

/// One deployment environment
#[derive(Debug, Clone, Deserialize)]
pub struct EnvConfig {
    /// Nimbus coordinator, `host` or `host:port`
    pub nimbus: Option<String>,

    /// SSH user for the tunnel (defaults to the current user at the ssh level)
    pub user: Option<String>,

    /// Reach Nimbus through an SSH tunnel instead of a direct connection
    #[serde(default = "default_true")]
    pub use_ssh_for_nimbus: bool,

    /// Run topology components out of a managed per-topology virtualenv
    #[serde(default = "default_true")]
    pub use_virtualenv: bool,

    /// Root directory of managed virtualenvs on the workers
    pub virtualenv_root: Option<String>,

    /// Command invoked to reconcile the topology virtualenv before submit;
    /// receives `<env> <topology> <requirements-file>` as trailing arguments
    pub virtualenv_sync_command: Option<Vec<String>>,

    /// Log routing options forwarded to the running topology
    #[serde(default)]
    pub log: LogSettings,

    /// Legacy fallback used when `log.path` is absent
    pub log_path: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Hook commands run around submission; both optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HooksConfig {
    /// Run before the virtualenv/build/submit sequence
    pub pre_submit: Option<Vec<String>>,

    /// Run only after a successful submission
    pub post_submit: Option<Vec<String>>,
}

/// A resolved topology: its name and definition file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyDefinition {
    pub name: String,
    pub file: PathBuf,
}

/// Errors loading or resolving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown environment '{name}'; available: {}", .available.join(", "))]
    UnknownEnv { name: String, available: Vec<String> },

    #[error("environment '{0}' has no nimbus coordinator configured")]
    NoNimbus(String),

    #[error("environment '{env}' has an invalid nimbus value '{value}'")]
    InvalidNimbus { env: String, value: String },

    #[error("environment '{0}' uses a virtualenv but sets no virtualenv_root")]
    MissingVirtualenvRoot(String),

    #[error("topology definition not found: {0}")]
    TopologyNotFound(PathBuf),

    #[error("no topology definitions in {0}; create one or pass --name")]
    NoTopologies(PathBuf),

    #[error("multiple topology definitions found ({}); pass --name to choose one", .found.join(", "))]
    AmbiguousTopology { found: Vec<String> },
}

impl Config {
    /// Load and validate the config file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate config from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, env) in &self.envs {
            match &env.nimbus {
                None => return Err(ConfigError::NoNimbus(name.clone())),
                Some(value) => {
                    env.nimbus_endpoint()
                        .map_err(|_| ConfigError::InvalidNimbus {
                            env: name.clone(),
                            value: value.clone(),
                        })?;
                }
            }
            if env.use_virtualenv && env.virtualenv_root.is_none() {
                return Err(ConfigError::MissingVirtualenvRoot(name.clone()));
            }
        }
        Ok(())
    }

    /// Look up an environment by name
    pub fn env(&self, name: &str) -> Result<&EnvConfig, ConfigError> {
        self.envs.get(name).ok_or_else(|| ConfigError::UnknownEnv {
            name: name.to_string(),
            available: self.envs.keys().cloned().collect(),
        })
    }

    /// Resolve the topology to deploy.
    ///
    /// With an explicit name the definition file must exist. Without one,
    /// a lone definition under `topology_specs` is chosen; zero or several
    /// definitions require `--name`.
    pub fn resolve_topology(&self, name: Option<&str>) -> Result<TopologyDefinition, ConfigError> {
        if let Some(name) = name {
            let file = self
                .topology_specs
                .join(format!("{}.{}", name, TOPOLOGY_EXTENSION));
            if !file.exists() {
                return Err(ConfigError::TopologyNotFound(file));
            }
            return Ok(TopologyDefinition {
                name: name.to_string(),
                file,
            });
        }

        let mut found = Vec::new();
        if self.topology_specs.is_dir() {
            for entry in std::fs::read_dir(&self.topology_specs)? {
                let path = entry?.path();
                let is_definition = path
                    .extension()
                    .map(|ext| ext == TOPOLOGY_EXTENSION)
                    .unwrap_or(false);
                if is_definition {
                    if let Some(stem) = path.file_stem() {
                        found.push((stem.to_string_lossy().into_owned(), path.clone()));
                    }
                }
            }
        }
        found.sort();

        match found.len() {
            0 => Err(ConfigError::NoTopologies(self.topology_specs.clone())),
            1 => {
                let (name, file) = found.remove(0);
                Ok(TopologyDefinition { name, file })
            }
            _ => Err(ConfigError::AmbiguousTopology {
                found: found.into_iter().map(|(name, _)| name).collect(),
            }),
        }
    }

    /// Requirements file consumed by the virtualenv sync collaborator
    pub fn virtualenv_spec_path(&self, topology_name: &str) -> PathBuf {
        self.virtualenv_specs.join(format!("{}.txt", topology_name))
    }
}

impl EnvConfig {
    /// Split the configured coordinator into host and port
    pub fn nimbus_endpoint(&self) -> Result<(String, u16), ConfigError> {
        let value = self
            .nimbus
            .as_deref()
            .ok_or_else(|| ConfigError::NoNimbus(String::new()))?;

        let (host, port) = match value.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| ConfigError::InvalidNimbus {
                    env: String::new(),
                    value: value.to_string(),
                })?;
                (host, port)
            }
            None => (value, DEFAULT_NIMBUS_PORT),
        };

        if host.is_empty() {
            return Err(ConfigError::InvalidNimbus {
                env: String::new(),
                value: value.to_string(),
            });
        }
        Ok((host.to_string(), port))
    }

    /// Interpreter path inside the managed virtualenv, when one is in use
    pub fn python_path(&self, topology_name: &str) -> Option<String> {
        if !self.use_virtualenv {
            return None;
        }
        self.virtualenv_root.as_deref().map(|root| {
            format!("{}/{}/bin/python", root.trim_end_matches('/'), topology_name)
        })
    }
}
