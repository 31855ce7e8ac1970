use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, validating, or saving a [`crate::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read from disk.
    #[error("failed to read config at {path}: {source}")]
    Read {
        /// The path that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file's JSON could not be parsed.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        /// The path that failed to parse.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A required field was empty or otherwise invalid.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// The atomic temp-file write or rename failed.
    #[error("failed to write config at {path}: {source}")]
    Write {
        /// The path the config was being written to.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The home directory could not be resolved (needed for the default
    /// config path).
    #[error("could not resolve a home directory")]
    NoHomeDirectory,
}

/// Convenience alias for [`ConfigError`] results.
pub type ConfigResult<T> = Result<T, ConfigError>;
