pub mod env_interpolation;
pub mod types;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use types::*;

/// Versioned configuration wrapper
/// This allows us to evolve the config format over time while maintaining backward compatibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "config_version")]
pub enum AnchorConfigVersioned {
    #[serde(rename = "1")]
    V1(AnchorConfigV1),
}

impl AnchorConfigVersioned {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string, resolving `${VAR}` references first
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let content = env_interpolation::interpolate_yaml_content(content)?;

        let yaml_value: serde_yaml::Value = serde_yaml::from_str(&content).context("Failed to parse YAML")?;
        if yaml_value.get("config_version").is_none() {
            anyhow::bail!(
                "Missing required field 'config_version' in config file. \
                 Current supported version: 1"
            );
        }

        let versioned: AnchorConfigVersioned = serde_yaml::from_str(&content).context("Failed to deserialize config")?;
        versioned.validate()?;
        Ok(versioned)
    }

    /// Convert to the canonical (latest) config format
    pub fn into_canonical(self) -> AnchorConfig {
        match self {
            AnchorConfigVersioned::V1(v1) => v1,
        }
    }

    fn validate(&self) -> Result<()> {
        let AnchorConfigVersioned::V1(config) = self;
        if config.database.backend == DatabaseBackend::RocksDb && config.database.path.is_none() {
            anyhow::bail!("database.path is required for the rocksdb backend");
        }
        if config.jobs.step_policy.max_attempts == Some(0) {
            anyhow::bail!("jobs.step_policy.max_attempts must be at least 1");
        }
        Ok(())
    }
}

/// Canonical configuration (always latest version internally)
pub type AnchorConfig = AnchorConfigV1;

/// Version 1 of the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfigV1 {
    pub ethereum: EthereumConfig,
    pub substrate: SubstrateConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Load `.env` (when present) then the YAML config at `path`
pub fn load_config(path: &Path, env_file: Option<&Path>) -> Result<AnchorConfig> {
    if let Some(env_file) = env_file {
        env_interpolation::load_env_file(env_file)?;
    }
    Ok(AnchorConfigVersioned::from_yaml_file(path)?.into_canonical())
}
