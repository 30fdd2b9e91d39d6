//! Logging configuration

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
const FORMATS: [&str; 3] = ["json", "human", "logfmt"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Env: ROLLCALL_LOG_LEVEL
    pub level: String,
    /// Env: ROLLCALL_LOG_FORMAT
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "json".to_string() }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        *self = other;
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("ROLLCALL_LOG_LEVEL") {
            self.level = level.to_lowercase();
        }
        if let Some(format) = lookup("ROLLCALL_LOG_FORMAT") {
            self.format = format.to_lowercase();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !LEVELS.contains(&self.level.as_str()) {
            bail!("Invalid level {:?}: must be one of {}", self.level, LEVELS.join(", "));
        }
        if !FORMATS.contains(&self.format.as_str()) {
            bail!("Invalid format {:?}: must be one of {}", self.format, FORMATS.join(", "));
        }
        Ok(())
    }

    /// Runtime logging setup for these settings
    pub fn to_logging_config(&self) -> Result<crate::logging::LoggingConfig> {
        self.validate()?;
        let level = self.level.parse().map_err(anyhow::Error::msg)?;
        let format = self.format.parse().map_err(anyhow::Error::msg)?;
        Ok(crate::logging::LoggingConfig::new().with_level(level).with_format(format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogFormat, LogLevel};

    #[test]
    fn test_unknown_values_rejected() {
        let config = LoggingConfig { level: "verbose".into(), ..LoggingConfig::default() };
        assert!(config.validate().is_err());

        let config = LoggingConfig { format: "xml".into(), ..LoggingConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_logging_config() {
        let config = LoggingConfig { level: "debug".into(), format: "human".into() };
        let runtime = config.to_logging_config().unwrap();
        assert_eq!(runtime.level, LogLevel::Debug);
        assert_eq!(runtime.format, LogFormat::Human);
    }
}
