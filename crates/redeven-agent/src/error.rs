use std::path::PathBuf;

use thiserror::Error;

/// Errors that can abort agent startup. None of these are recoverable by
/// retrying internally; the process exits non-zero.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Another instance already holds the process lock.
    #[error("another agent instance is already running{}", pid.map_or_else(String::new, |pid| format!(" (pid {pid})")))]
    AlreadyRunning {
        /// The running instance's pid, if it could be determined.
        pid: Option<u32>,
    },

    /// The lock file could not be opened, written, or locked.
    #[error("failed to acquire process lock at {path}: {source}")]
    Lock {
        /// The lock file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Config loading or validation failed.
    #[error("failed to load config: {0}")]
    Config(#[from] redeven_config::ConfigError),

    /// Installing the SIGTERM handler failed.
    #[error("failed to install SIGTERM handler: {0}")]
    Signal(#[source] std::io::Error),
}

/// Convenience alias for [`SupervisorError`] results.
pub type SupervisorResult<T> = Result<T, SupervisorError>;
