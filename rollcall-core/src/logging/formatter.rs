//! Log entries and their line formats

use crate::logging::{LogLevel, LoggingConfig};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One structured log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Usually the module path
    pub target: String,
    pub fields: BTreeMap<String, serde_json::Value>,
    /// `file:line` when location capture is enabled
    pub location: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            target: target.into(),
            fields: BTreeMap::new(),
            location: None,
        }
    }

    pub fn from_record(record: &log::Record<'_>, config: &LoggingConfig) -> Self {
        let mut entry = Self::new(record.level().into(), record.args().to_string(), record.target());

        if config.include_location {
            if let (Some(file), Some(line)) = (record.file(), record.line()) {
                entry.location = Some(format!("{}:{}", file, line));
            }
        }

        for (key, value) in &config.context_fields {
            entry.fields.insert(key.clone(), serde_json::Value::String(value.clone()));
        }

        entry
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// How log lines are rendered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// `{"timestamp":"…","level":"INFO","target":"…","message":"…"}`
    Json,
    /// `2026-01-15 10:30:00.000 INFO  [rollcall_core::session] Principal u1 authenticated`
    Human,
    /// `timestamp=… level=INFO target=… message="…"`
    Logfmt,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "human" | "text" => Ok(LogFormat::Human),
            "logfmt" => Ok(LogFormat::Logfmt),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogFormat::Json => "json",
            LogFormat::Human => "human",
            LogFormat::Logfmt => "logfmt",
        };
        f.write_str(s)
    }
}

impl LogFormat {
    pub fn format_entry(&self, entry: &LogEntry) -> String {
        match self {
            LogFormat::Json => format_json(entry),
            LogFormat::Human => format_human(entry),
            LogFormat::Logfmt => format_logfmt(entry),
        }
    }
}

fn format_json(entry: &LogEntry) -> String {
    let mut json = serde_json::Map::new();
    json.insert("timestamp".into(), entry.timestamp.to_rfc3339().into());
    json.insert("level".into(), entry.level.as_str().into());
    json.insert("target".into(), entry.target.clone().into());
    json.insert("message".into(), entry.message.clone().into());
    if let Some(location) = &entry.location {
        json.insert("location".into(), location.clone().into());
    }
    for (key, value) in &entry.fields {
        json.insert(key.clone(), value.clone());
    }

    serde_json::to_string(&json).unwrap_or_else(|_| "Failed to serialize log entry".to_string())
}

fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_human(entry: &LogEntry) -> String {
    let mut line = format!(
        "{} {:5} [{}] {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        entry.level.as_str(),
        entry.target,
        entry.message
    );
    for (key, value) in &entry.fields {
        line.push_str(&format!(" {}={}", key, plain(value)));
    }
    if let Some(location) = &entry.location {
        line.push_str(&format!(" ({})", location));
    }
    line
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn format_logfmt(entry: &LogEntry) -> String {
    let mut parts = vec![
        format!("timestamp={}", entry.timestamp.to_rfc3339()),
        format!("level={}", entry.level.as_str()),
        format!("target={}", entry.target),
        format!("message={}", quote(&entry.message)),
    ];
    if let Some(location) = &entry.location {
        parts.push(format!("location={}", quote(location)));
    }
    for (key, value) in &entry.fields {
        let rendered = match value {
            serde_json::Value::Number(_) | serde_json::Value::Bool(_) => value.to_string(),
            other => quote(&plain(other)),
        };
        parts.push(format!("{}={}", key, rendered));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_format() {
        let entry = LogEntry::new(LogLevel::Info, "Principal u1 authenticated", "rollcall_core::session")
            .with_field("school", "s1");

        let formatted = LogFormat::Json.format_entry(&entry);
        let parsed: serde_json::Value = serde_json::from_str(&formatted).unwrap();
        assert_eq!(parsed["message"], "Principal u1 authenticated");
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["school"], "s1");
    }

    #[test]
    fn test_human_format() {
        let entry = LogEntry::new(LogLevel::Warn, "Permission load failed", "rollcall_core::cache")
            .with_field("attempt", 2);

        let formatted = LogFormat::Human.format_entry(&entry);
        assert!(formatted.contains("WARN"));
        assert!(formatted.contains("[rollcall_core::cache] Permission load failed"));
        assert!(formatted.contains("attempt=2"));
    }

    #[test]
    fn test_logfmt_escapes_quotes() {
        let entry = LogEntry::new(LogLevel::Debug, r#"said "hi""#, "t");
        let formatted = LogFormat::Logfmt.format_entry(&entry);
        assert!(formatted.contains(r#"message="said \"hi\"""#));
        assert!(formatted.contains("level=DEBUG"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Human));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
