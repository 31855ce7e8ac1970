use thiserror::Error;

use redeven_core::AgentError;

/// Errors raised by the virtual filesystem.
#[derive(Debug, Error)]
pub enum VfsError {
    /// A virtual path was malformed or otherwise unusable.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The effective permission set disallows the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The target path does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A directory delete was attempted without `recursive` on a
    /// non-empty directory.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A file-read offset was beyond the file's size.
    #[error("offset out of range: {0}")]
    OutOfRange(String),

    /// An underlying I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;

impl From<VfsError> for AgentError {
    fn from(err: VfsError) -> Self {
        let message = err.to_string();
        match err {
            VfsError::InvalidPath(_) => Self::InvalidRequest(message),
            VfsError::PermissionDenied(_) => Self::PermissionDenied(message),
            VfsError::NotFound(_) => Self::NotFound(message),
            VfsError::Conflict(_) => Self::Conflict(message),
            VfsError::OutOfRange(_) => Self::OutOfRange(message),
            VfsError::Io(_) => Self::Internal(message),
        }
    }
}
