//! `tracing-subscriber` setup driven by a [`LogConfig`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::error::{TelemetryError, TelemetryResult};

static SUBSCRIBER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Output formatting for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-oriented output with span context.
    Pretty,
    /// Single-line, human-oriented output.
    Compact,
    /// Single-line, machine-parseable JSON.
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Compact
    }
}

/// Where log output is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
    /// An append-only file at the given path.
    File(PathBuf),
}

impl Default for LogTarget {
    fn default() -> Self {
        Self::Stderr
    }
}

/// Logging configuration: base level, extra per-module directives, output
/// format, and output target.
#[derive(Debug, Clone)]
pub struct LogConfig {
    level: String,
    directives: Vec<String>,
    format: LogFormat,
    target: LogTarget,
}

impl LogConfig {
    /// Start a config at the given base level (`"trace"`, `"debug"`,
    /// `"info"`, `"warn"`, or `"error"`).
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            directives: Vec::new(),
            format: LogFormat::default(),
            target: LogTarget::default(),
        }
    }

    /// Set the output format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the output target.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// Add an extra `EnvFilter` directive, e.g. `"redeven_rpc=trace"`.
    #[must_use]
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.level)
            .map_err(|source| TelemetryError::ConfigError(source.to_string()))?;
        for directive in &self.directives {
            let directive = directive
                .parse()
                .map_err(|_| TelemetryError::ConfigError(format!("invalid directive: {directive}")))?;
            filter = filter.add_directive(directive);
        }
        Ok(filter)
    }
}

/// Install a global `tracing` subscriber built from `config`.
///
/// Calling this more than once is a no-op after the first success: a
/// process has exactly one global subscriber, and the agent supervisor
/// calls this once at startup.
///
/// # Errors
///
/// Returns [`TelemetryError::ConfigError`] if the level or a directive
/// fails to parse, or [`TelemetryError::IoError`] if a file target cannot
/// be opened.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    if SUBSCRIBER_INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);

    match (&config.target, config.format) {
        (LogTarget::Stdout, LogFormat::Json) => builder.json().with_writer(std::io::stdout).init(),
        (LogTarget::Stdout, LogFormat::Pretty) => builder.pretty().with_writer(std::io::stdout).init(),
        (LogTarget::Stdout, LogFormat::Compact) => builder.compact().with_writer(std::io::stdout).init(),
        (LogTarget::Stderr, LogFormat::Json) => builder.json().with_writer(std::io::stderr).init(),
        (LogTarget::Stderr, LogFormat::Pretty) => builder.pretty().with_writer(std::io::stderr).init(),
        (LogTarget::Stderr, LogFormat::Compact) => builder.compact().with_writer(std::io::stderr).init(),
        (LogTarget::File(path), format) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().ok_or_else(|| {
                TelemetryError::ConfigError(format!("log file path has no file name: {}", path.display()))
            })?;
            let file_appender = tracing_appender::rolling::never(dir, file_name);
            match format {
                LogFormat::Json => builder.json().with_writer(file_appender).with_ansi(false).init(),
                LogFormat::Pretty => builder.pretty().with_writer(file_appender).with_ansi(false).init(),
                LogFormat::Compact => builder.compact().with_writer(file_appender).with_ansi(false).init(),
            }
        }
    }

    Ok(())
}

/// Install a global subscriber at `info` level, writing compact text to
/// stderr. Convenient for tests and small tools.
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_filter_parses_base_level_and_directives() {
        let config = LogConfig::new("info").with_directive("redeven_rpc=trace");
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn env_filter_rejects_malformed_directive() {
        let config = LogConfig::new("info").with_directive("not a directive!!");
        assert!(config.env_filter().is_err());
    }

    #[test]
    fn setup_default_logging_does_not_panic_when_called_twice() {
        assert!(setup_default_logging().is_ok());
        assert!(setup_default_logging().is_ok());
    }
}
