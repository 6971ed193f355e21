//! Runtime configuration loader.

use crate::error::ConfigError;
use clawhands_providers::{BalancerPolicy, ProviderAdapterConfig};
use clawhands_tools::context::DEFAULT_TIMEOUT_MS;
use clawhands_tools::OverflowConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_ENV: &str = "CLAWHANDS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "clawhands.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Base directory for per-session working directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
    #[serde(default)]
    pub overflow: OverflowConfig,
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
    #[serde(default)]
    pub balancer: BalancerPolicy,
    #[serde(default)]
    pub providers: Vec<ProviderAdapterConfig>,
}

fn default_tool_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workspace_root: None,
            overflow: OverflowConfig::default(),
            tool_timeout_ms: DEFAULT_TIMEOUT_MS,
            balancer: BalancerPolicy::default(),
            providers: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Config file to use: the explicit path, else `$CLAWHANDS_CONFIG`, else
    /// `./clawhands.yaml`.
    pub fn locate(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content)?;
        info!(
            path = %path.display(),
            providers = config.providers.len(),
            "Loaded runtime config"
        );
        Ok(config)
    }

    /// Like [`RuntimeConfig::load`], but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.overflow.max_inline_size == 0 {
            return Err(ConfigError::Invalid(
                "overflow.max_inline_size must be greater than zero".to_string(),
            ));
        }
        if self.overflow.preview_size == 0 {
            return Err(ConfigError::Invalid(
                "overflow.preview_size must be greater than zero".to_string(),
            ));
        }
        if self.tool_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "tool_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.provider_id.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "provider_id must not be empty".to_string(),
                ));
            }
            if !seen.insert(provider.provider_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider id: {}",
                    provider.provider_id
                )));
            }
        }
        Ok(())
    }
}
