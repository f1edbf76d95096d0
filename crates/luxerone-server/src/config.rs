//! `configuration.yaml` loading
//!
//! Only the `luxerone_residential` key is read; any other top-level keys are
//! ignored so the file can be shared with other tooling.

use std::fs;
use std::path::{Path, PathBuf};

use luxerone_residential::CodeComparison;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "configuration.yaml";

pub const DEFAULT_SCAN_INTERVAL: u64 = 60;

/// Polling more often than this is refused
pub const MIN_SCAN_INTERVAL: u64 = 10;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    luxerone_residential: Option<LuxerOneConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LuxerOneConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
    #[serde(default)]
    pub change_detection: CodeComparison,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    pub password: SecretString,
}

impl LuxerOneConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.scan_interval < MIN_SCAN_INTERVAL {
            return Err(ConfigError::InvalidValue {
                key: "scan_interval".to_string(),
                reason: format!(
                    "must be at least {MIN_SCAN_INTERVAL} seconds, got {}",
                    self.scan_interval
                ),
            });
        }
        if self.accounts.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "accounts".to_string(),
                reason: "at least one account is required".to_string(),
            });
        }
        for (index, account) in self.accounts.iter().enumerate() {
            if account.username.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("accounts[{index}].username"),
                    reason: "must not be empty".to_string(),
                });
            }
            if account.password.expose_secret().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("accounts[{index}].password"),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Parse and validate configuration text read from `path`
pub fn parse(content: &str, path: &Path) -> ConfigResult<LuxerOneConfig> {
    let file: ConfigFile = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = file
        .luxerone_residential
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "luxerone_residential".to_string(),
            reason: "section is missing".to_string(),
        })?;
    config.validate()?;
    Ok(config)
}

pub fn load(path: impl AsRef<Path>) -> ConfigResult<LuxerOneConfig> {
    let path = path.as_ref();
    debug!("Loading configuration: {:?}", path);

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&content, path)
}
