//! Configuration system for Rollcall
//!
//! This module provides the configuration for an [`AccessControl`](crate::access::AccessControl):
//! - Multiple configuration sources (defaults, files, environment, code)
//! - Clear supersedence hierarchy
//! - Type-safe configuration structs
//!
//! # Configuration Hierarchy
//!
//! Configuration values are resolved in the following order (highest priority wins):
//!
//! 1. **Code** (Builder pattern) - Highest priority
//! 2. **Environment Variables** - Override file config
//! 3. **Config File** (rollcall.toml) - Override defaults
//! 4. **Defaults** - Lowest priority
//!
//! # Example
//!
//! ```no_run
//! use rollcall_core::config::RollcallConfig;
//!
//! // Load with full supersedence
//! let config = RollcallConfig::load()?;
//!
//! // Or load from specific file
//! let config = RollcallConfig::from_file("rollcall.toml")?;
//!
//! // Or use defaults
//! let config = RollcallConfig::default();
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod access;
pub mod logging;
pub mod sessions;

pub use access::AccessConfig;
pub use logging::LoggingConfig;
pub use sessions::SessionsConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete Rollcall configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollcallConfig {
    pub access: AccessConfig,
    pub sessions: SessionsConfig,
    pub logging: LoggingConfig,
}

impl RollcallConfig {
    /// Load configuration with full supersedence chain
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file (rollcall.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self> {
        Self::load_from("rollcall.toml")
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = Self::default();

        if path.exists() {
            let file_config = Self::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.merge(file_config);
        }

        config.apply_env_vars();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.as_ref().display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Merge another config into this one (other takes priority)
    pub fn merge(&mut self, other: Self) {
        self.access.merge(other.access);
        self.sessions.merge(other.sessions);
        self.logging.merge(other.logging);
    }

    /// Apply environment variables to configuration
    pub fn apply_env_vars(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.access.apply_env(&lookup);
        self.sessions.apply_env(&lookup);
        self.logging.apply_env(&lookup);
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.access.validate().context("Invalid [access] section")?;
        self.sessions.validate().context("Invalid [sessions] section")?;
        self.logging.validate().context("Invalid [logging] section")?;
        Ok(())
    }
}
