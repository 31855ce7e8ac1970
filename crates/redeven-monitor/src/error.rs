use thiserror::Error;

use redeven_core::AgentError;

/// Errors raised by the monitor service.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The effective permission set disallows the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The sampling task could not complete.
    #[error("monitor unavailable: {0}")]
    Unavailable(String),
}

/// Convenience result type for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

impl From<MonitorError> for AgentError {
    fn from(err: MonitorError) -> Self {
        let message = err.to_string();
        match err {
            MonitorError::PermissionDenied(_) => Self::PermissionDenied(message),
            MonitorError::Unavailable(_) => Self::Unavailable(message),
        }
    }
}
