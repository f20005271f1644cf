//! Global configuration for dkr
//!
//! Located at `~/.config/dkr/config.toml`

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "DKR_CONFIG";

/// Environment variable that overrides the engine endpoint
pub const DOCKER_HOST_ENV: &str = "DOCKER_HOST";

/// Global dkr configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub engine: EngineConfig,
    pub build: BuildSettings,
    pub passthrough: PassthroughConfig,
}

/// Container engine connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine endpoint (`unix://`, `tcp://`, `http://` or a bare socket path)
    pub host: String,
    /// Request timeout in seconds
    pub timeout: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: default_engine_host(),
            timeout: 120,
        }
    }
}

#[cfg(windows)]
fn default_engine_host() -> String {
    "npipe:////./pipe/docker_engine".to_string()
}

#[cfg(not(windows))]
fn default_engine_host() -> String {
    "unix:///var/run/docker.sock".to_string()
}

/// How ADD/COPY source lists from several instructions are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMerge {
    /// The last ADD/COPY instruction replaces every earlier one
    #[default]
    Last,
    /// Sources of every ADD/COPY instruction are kept, in file order
    Union,
}

/// Image build settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    pub source_merge: SourceMerge,
}

/// Delegation to a locally installed docker binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PassthroughConfig {
    /// Environment variable that switches passthrough on when set to `1`
    pub env: String,
    /// Executable name searched for on `PATH`
    pub binary: String,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            env: "DOCKER_PASSTHROUGH".to_string(),
            binary: "docker".to_string(),
        }
    }
}

impl PassthroughConfig {
    /// Whether the given value of the switch variable enables passthrough
    pub fn is_enabled(&self, value: Option<&str>) -> bool {
        matches!(value.map(str::trim), Some("1"))
    }
}

impl GlobalConfig {
    /// Load global configuration from `DKR_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::config_path()?,
        };
        Self::load_from(&path)
    }

    /// Load global configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        if config.engine.timeout == 0 {
            return Err(ConfigError::Invalid(
                "engine.timeout must be greater than zero".to_string(),
            ));
        }

        tracing::debug!("Loaded config from {:?}: engine={}", path, config.engine.host);
        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "dkr").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Engine endpoint, preferring a non-empty `DOCKER_HOST` value
    pub fn engine_host(&self, docker_host: Option<String>) -> String {
        docker_host
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| self.engine.host.clone())
    }
}
