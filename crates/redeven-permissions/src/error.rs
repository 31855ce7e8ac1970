use thiserror::Error;

/// Errors returned while loading or validating a [`crate::PermissionPolicy`].
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The policy's `schema_version` is not one this build understands.
    #[error("unsupported permission policy schema version: {found} (expected {expected})")]
    UnsupportedSchemaVersion {
        /// Schema version found on disk.
        found: u32,
        /// Schema version this build expects.
        expected: u32,
    },
}

/// Convenience alias for [`PermissionError`] results.
pub type PermissionResult<T> = Result<T, PermissionError>;
