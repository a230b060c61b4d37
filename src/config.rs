use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::storage::StorageKeys;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid store config: {0}")]
    Invalid(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Namespace put in front of every storage key
    pub key_prefix: String,
    /// Name of the template seeded into an empty store
    pub default_template_name: String,
    /// Number of options the seeded template starts with
    pub default_option_count: usize,
    /// Seeded options are labeled "<prefix> 1", "<prefix> 2", ...
    pub default_option_prefix: String,
    /// Name used when a template is created without one
    pub new_template_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: StorageKeys::DEFAULT_PREFIX.to_string(),
            default_template_name: "Default".to_string(),
            default_option_count: 3,
            default_option_prefix: "Option".to_string(),
            new_template_name: "New Template".to_string(),
        }
    }
}

impl StoreConfig {
    const MAX_SEED_OPTIONS: usize = 64;

    /// Default config under another key namespace, e.g. one per user profile.
    pub fn namespaced(prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn storage_keys(&self) -> StorageKeys {
        StorageKeys::with_prefix(&self.key_prefix)
    }

    pub fn seed_option_labels(&self) -> Vec<String> {
        (1..=self.default_option_count)
            .map(|n| format!("{} {}", self.default_option_prefix, n))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "Key prefix must not contain whitespace".to_string(),
            ));
        }

        if self.default_template_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Default template name must not be empty".to_string(),
            ));
        }

        if self.new_template_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "New template name must not be empty".to_string(),
            ));
        }

        if self.default_option_count == 0 || self.default_option_count > Self::MAX_SEED_OPTIONS {
            return Err(ConfigError::Invalid(format!(
                "Seed option count must be between 1 and {}",
                Self::MAX_SEED_OPTIONS
            )));
        }

        Ok(())
    }

    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw).context("Store config is not valid TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read store config {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overridden by `WHEEL_*` variables, `.env` included.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(prefix) = lookup("WHEEL_KEY_PREFIX") {
            config.key_prefix = prefix;
        }
        if let Some(name) = lookup("WHEEL_DEFAULT_TEMPLATE_NAME") {
            config.default_template_name = name;
        }
        if let Some(name) = lookup("WHEEL_NEW_TEMPLATE_NAME") {
            config.new_template_name = name;
        }
        if let Some(prefix) = lookup("WHEEL_DEFAULT_OPTION_PREFIX") {
            config.default_option_prefix = prefix;
        }
        if let Some(count) = lookup("WHEEL_DEFAULT_OPTION_COUNT") {
            config.default_option_count =
                count.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    key: "WHEEL_DEFAULT_OPTION_COUNT".to_string(),
                    value: count.clone(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }
}
