use thiserror::Error;

use redeven_core::AgentError;

/// Errors raised by the terminal manager.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// A request was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The effective permission set disallows the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The session id is unknown.
    #[error("terminal session not found: {0}")]
    NotFound(String),

    /// A session with the requested name already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The PTY could not be allocated.
    #[error("terminal unavailable: {0}")]
    Unavailable(String),

    /// An underlying I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for terminal operations.
pub type TerminalResult<T> = Result<T, TerminalError>;

impl From<TerminalError> for AgentError {
    fn from(err: TerminalError) -> Self {
        let message = err.to_string();
        match err {
            TerminalError::InvalidRequest(_) => Self::InvalidRequest(message),
            TerminalError::PermissionDenied(_) => Self::PermissionDenied(message),
            TerminalError::NotFound(_) => Self::NotFound(message),
            TerminalError::Conflict(_) => Self::Conflict(message),
            TerminalError::Unavailable(_) => Self::Unavailable(message),
            TerminalError::Io(_) => Self::Internal(message),
        }
    }
}
