//! Rollcall logging
//!
//! Library code logs through the standard `log` macros. Applications that do
//! not bring their own logger can install this one once at startup:
//!
//! ```rust,no_run
//! use rollcall_core::logging::{init_logging, LoggingConfig};
//!
//! let config = LoggingConfig::production().with_context_field("service", "rollcall");
//! init_logging(&config).unwrap();
//!
//! log::info!("Access control ready");
//! ```
//!
//! Tokens never reach the log: credential types redact themselves in `Debug`.

pub mod config;
pub mod formatter;

pub use config::{LogLevel, LogOutput, LoggingConfig};
pub use formatter::{LogEntry, LogFormat};

use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Install the Rollcall logger
///
/// Only the first call has an effect; later calls return `Ok(())`. Fails if
/// another logger was installed first.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = install(config);
    });
    result
}

fn install(config: &LoggingConfig) -> anyhow::Result<()> {
    log::set_boxed_logger(Box::new(RollcallLogger::new(config.clone())))
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;
    log::set_max_level(config.level.to_filter());
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

struct ConsoleWriter {
    stream: Stream,
    format: LogFormat,
}

impl ConsoleWriter {
    fn write(&self, entry: &LogEntry) -> std::io::Result<()> {
        let line = self.format.format_entry(entry);
        match self.stream {
            Stream::Stdout => writeln!(std::io::stdout().lock(), "{}", line),
            Stream::Stderr => writeln!(std::io::stderr().lock(), "{}", line),
        }
    }

    fn flush(&self) -> std::io::Result<()> {
        match self.stream {
            Stream::Stdout => std::io::stdout().flush(),
            Stream::Stderr => std::io::stderr().flush(),
        }
    }
}

/// `log::Log` implementation writing formatted entries to the console
struct RollcallLogger {
    config: LoggingConfig,
    writers: Vec<ConsoleWriter>,
}

impl RollcallLogger {
    fn new(config: LoggingConfig) -> Self {
        let mut writers: Vec<ConsoleWriter> = config
            .outputs
            .iter()
            .map(|output| match output {
                LogOutput::Stdout { format } => {
                    ConsoleWriter { stream: Stream::Stdout, format: format.unwrap_or(config.format) }
                }
                LogOutput::Stderr { format } => {
                    ConsoleWriter { stream: Stream::Stderr, format: format.unwrap_or(config.format) }
                }
            })
            .collect();

        if writers.is_empty() {
            writers.push(ConsoleWriter { stream: Stream::Stderr, format: config.format });
        }

        Self { config, writers }
    }
}

impl log::Log for RollcallLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::Level::from(self.config.level)
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let entry = LogEntry::from_record(record, &self.config);
        for writer in &self.writers {
            let _ = writer.write(&entry);
        }
    }

    fn flush(&self) {
        for writer in &self.writers {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    #[test]
    fn test_logger_respects_level() {
        let logger = RollcallLogger::new(LoggingConfig::new().with_level(LogLevel::Warn));
        let warn = log::Metadata::builder().level(log::Level::Warn).build();
        let debug = log::Metadata::builder().level(log::Level::Debug).build();

        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&debug));
    }

    #[test]
    fn test_output_format_override() {
        let config = LoggingConfig::production()
            .with_output(LogOutput::Stderr { format: Some(LogFormat::Logfmt) });
        let logger = RollcallLogger::new(config);

        assert_eq!(logger.writers.len(), 2);
        assert_eq!(logger.writers[0].format, LogFormat::Json);
        assert_eq!(logger.writers[1].stream, Stream::Stderr);
        assert_eq!(logger.writers[1].format, LogFormat::Logfmt);
    }

    #[test]
    fn test_init_is_idempotent() {
        // the logger is process-wide; stay quiet for the rest of the suite
        let config = LoggingConfig::new().with_level(LogLevel::Error);
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(second.is_ok());
        drop(first);
    }
}
