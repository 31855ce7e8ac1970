use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard RPC error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    /// Malformed payload or argument.
    InvalidRequest = 400,
    /// The session's effective permission set disallows the operation.
    PermissionDenied = 403,
    /// Path, session, or type id absent.
    NotFound = 404,
    /// Duplicate terminal session name, or duplicate grant for the same channel.
    Conflict = 409,
    /// File-read offset beyond the file's size.
    OutOfRange = 416,
    /// Unexpected handler failure.
    Internal = 500,
    /// Temporary resource exhaustion.
    Unavailable = 503,
}

impl ErrorCode {
    /// The numeric wire value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// The agent-wide error type every RPC handler error converts into before
/// being mapped to the wire `{code, message}` shape.
///
/// Every leaf crate keeps its own `thiserror` enum (`VfsError`,
/// `TerminalError`, `MonitorError`, ...) under this shared umbrella; those
/// crates convert into `AgentError` only at the RPC-handler boundary.
#[derive(Debug, Error)]
pub enum AgentError {
    /// `400 invalid_request`.
    #[error("{0}")]
    InvalidRequest(String),
    /// `403 permission_denied`.
    #[error("{0}")]
    PermissionDenied(String),
    /// `404 not_found`.
    #[error("{0}")]
    NotFound(String),
    /// `409 conflict`.
    #[error("{0}")]
    Conflict(String),
    /// `416 out_of_range`.
    #[error("{0}")]
    OutOfRange(String),
    /// `500 internal`.
    #[error("{0}")]
    Internal(String),
    /// `503 unavailable`.
    #[error("{0}")]
    Unavailable(String),
}

impl AgentError {
    /// The wire error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::OutOfRange(_) => ErrorCode::OutOfRange,
            Self::Internal(_) => ErrorCode::Internal,
            Self::Unavailable(_) => ErrorCode::Unavailable,
        }
    }

    /// The human-readable message for this error.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// The wire `{code, message}` shape every RPC reply and the `fs/read_file`
/// stream's error header use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    /// The numeric error code.
    pub code: u16,
    /// A human-readable message.
    pub message: String,
}

impl From<&AgentError> for WireError {
    fn from(err: &AgentError) -> Self {
        Self { code: err.code().as_u16(), message: err.message() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_spec_wire_values() {
        assert_eq!(AgentError::InvalidRequest("x".into()).code().as_u16(), 400);
        assert_eq!(AgentError::PermissionDenied("x".into()).code().as_u16(), 403);
        assert_eq!(AgentError::NotFound("x".into()).code().as_u16(), 404);
        assert_eq!(AgentError::Conflict("x".into()).code().as_u16(), 409);
        assert_eq!(AgentError::OutOfRange("x".into()).code().as_u16(), 416);
        assert_eq!(AgentError::Internal("x".into()).code().as_u16(), 500);
        assert_eq!(AgentError::Unavailable("x".into()).code().as_u16(), 503);
    }
}
