//! Proxy configuration, persisted as TOML.
//!
//! Every field has a serde default, so a missing file or a partial file both
//! yield a usable config. Bind address and port can be overridden from the
//! environment after loading.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::ProxyPaths;

/// Env var naming an explicit config file.
pub const CONFIG_ENV: &str = "PLANTD_PROXY_CONFIG";
/// Env var overriding `server.bind`.
pub const BIND_ENV: &str = "PLANTD_PROXY_BIND";
/// Env var overriding `server.port`.
pub const PORT_ENV: &str = "PLANTD_PROXY_PORT";

/// Errors from config operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(plantd::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(plantd::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(plantd::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {var}: \"{value}\"")]
    #[diagnostic(code(plantd::config::env), help("The port must be a number between 0 and 65535."))]
    InvalidEnv { var: String, value: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which backing store the proxy talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Durable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest accepted request body (import uploads), in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Directory for the durable backend. Defaults to the XDG data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Limits applied when decoding an uploaded archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveLimits {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: u64,
}

/// The CoreConfig singleton provisioned at startup when it does not exist yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSeed {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_core_namespace")]
    pub namespace: String,
    #[serde(default = "default_core_name")]
    pub name: String,
    /// Initial body.
    #[serde(default = "default_core_spec")]
    pub spec: serde_json::Value,
}

/// Top-level proxy configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub archive: ArchiveLimits,
    #[serde(default)]
    pub core: CoreSeed,
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}
fn default_max_entries() -> usize {
    10_000
}
fn default_max_entry_bytes() -> u64 {
    4 * 1024 * 1024
}

fn default_true() -> bool {
    true
}
fn default_core_namespace() -> String {
    "plantd".into()
}
fn default_core_name() -> String {
    "plantd-core".into()
}
fn default_core_spec() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Default for CoreSeed {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            namespace: default_core_namespace(),
            name: default_core_name(),
            spec: default_core_spec(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_entry_bytes: default_max_entry_bytes(),
        }
    }
}

impl ServerConfig {
    /// `bind:port` socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl ProxyConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Resolve the effective config: `PLANTD_PROXY_CONFIG` if set, else the
    /// XDG config file if it exists, else defaults; then env overrides.
    pub fn resolve(paths: &ProxyPaths) -> ConfigResult<Self> {
        let explicit = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let mut config = match explicit {
            Some(path) => Self::load(&path)?,
            None => {
                let path = paths.config_file();
                if path.exists() {
                    Self::load(&path)?
                } else {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_overrides(
            std::env::var(BIND_ENV).ok(),
            std::env::var(PORT_ENV).ok(),
        )?;
        Ok(config)
    }

    /// Apply bind/port overrides (as read from the environment).
    pub fn apply_overrides(
        &mut self,
        bind: Option<String>,
        port: Option<String>,
    ) -> ConfigResult<()> {
        if let Some(bind) = bind {
            self.server.bind = bind;
        }
        if let Some(port) = port {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                var: PORT_ENV.to_string(),
                value: port.clone(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.server.addr(), "0.0.0.0:5000");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.archive.max_entries, 10_000);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = ProxyConfig::from_toml(
            "[server]\nport = 8080\n\n[store]\nbackend = \"durable\"\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.store.backend, StoreBackend::Durable);
        assert_eq!(config.archive, ArchiveLimits::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = ProxyConfig::default();
        config.archive.max_entries = 5;
        config.store.data_dir = Some(dir.path().join("store"));
        config.save(&path).unwrap();
        assert_eq!(ProxyConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn core_seed_from_toml() {
        let config = ProxyConfig::from_toml(
            "[core]\nnamespace = \"ops\"\n\n[core.spec.prometheusConfiguration]\nscrapeInterval = \"15s\"\n",
        )
        .unwrap();
        assert!(config.core.enabled);
        assert_eq!(config.core.namespace, "ops");
        assert_eq!(config.core.name, "plantd-core");
        assert_eq!(
            config.core.spec,
            serde_json::json!({"prometheusConfiguration": {"scrapeInterval": "15s"}})
        );
        assert_eq!(ProxyConfig::default().core.spec, serde_json::json!({}));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            ProxyConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn overrides() {
        let mut config = ProxyConfig::default();
        config
            .apply_overrides(Some("127.0.0.1".into()), Some("9000".into()))
            .unwrap();
        assert_eq!(config.server.addr(), "127.0.0.1:9000");

        let err = config
            .apply_overrides(None, Some("not-a-port".into()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }
}
