//! Runtime logging setup

use crate::logging::LogFormat;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Where log lines go
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogOutput {
    /// Write to stdout, optionally overriding the default format
    Stdout { format: Option<LogFormat> },
    /// Write to stderr, optionally overriding the default format
    Stderr { format: Option<LogFormat> },
}

/// Logger settings
///
/// Built once at startup, usually from [`crate::config::LoggingConfig`].
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Minimum level captured
    pub level: LogLevel,
    pub outputs: Vec<LogOutput>,
    /// Format for outputs that do not override it
    pub format: LogFormat,
    /// Attach file and line to every entry
    pub include_location: bool,
    /// Fields added to every entry, e.g. `service` or `school`
    pub context_fields: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            outputs: vec![LogOutput::Stderr { format: None }],
            format: LogFormat::Human,
            include_location: false,
            context_fields: BTreeMap::new(),
        }
    }
}

/// Log levels in order of severity (compatible with the `log` crate)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    pub fn to_filter(self) -> log::LevelFilter {
        log::Level::from(self).to_level_filter()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::Error,
            log::Level::Warn => LogLevel::Warn,
            log::Level::Info => LogLevel::Info,
            log::Level::Debug => LogLevel::Debug,
            log::Level::Trace => LogLevel::Trace,
        }
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON lines on stdout
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            outputs: vec![LogOutput::Stdout { format: None }],
            format: LogFormat::Json,
            include_location: false,
            context_fields: BTreeMap::new(),
        }
    }

    /// Human-readable debug output on stderr, with source locations
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            outputs: vec![LogOutput::Stderr { format: None }],
            format: LogFormat::Human,
            include_location: true,
            context_fields: BTreeMap::new(),
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a context field that appears in every log entry
    pub fn with_context_field(mut self, key: &str, value: &str) -> Self {
        self.context_fields.insert(key.to_string(), value.to_string());
        self
    }

    /// Add an output; the first call replaces the default output
    pub fn with_output(mut self, output: LogOutput) -> Self {
        if self.outputs == LoggingConfig::default().outputs {
            self.outputs.clear();
        }
        self.outputs.push(output);
        self
    }

    pub fn with_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let production = LoggingConfig::production();
        assert_eq!(production.level, LogLevel::Info);
        assert_eq!(production.format, LogFormat::Json);

        let development = LoggingConfig::development();
        assert_eq!(development.level, LogLevel::Debug);
        assert!(development.include_location);
    }

    #[test]
    fn test_builder_pattern() {
        let config = LoggingConfig::new()
            .with_output(LogOutput::Stdout { format: Some(LogFormat::Logfmt) })
            .with_output(LogOutput::Stderr { format: None })
            .with_context_field("service", "rollcall")
            .with_level(LogLevel::Warn);

        assert_eq!(config.outputs.len(), 2);
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.context_fields.get("service").map(String::as_str), Some("rollcall"));
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Debug.to_filter(), log::LevelFilter::Debug);
    }
}
