use thiserror::Error;

use redeven_core::FrameError;

/// Errors raised by the RPC dispatcher's transport loop itself, as
/// distinct from a handler returning an [`redeven_core::AgentError`] (those
/// are written to the wire as an error reply, never surfaced here).
#[derive(Debug, Error)]
pub enum RpcError {
    /// The underlying frame transport failed or a frame exceeded the cap.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A frame's envelope header was too short or named an unknown kind byte.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
}

/// Convenience result type for dispatcher operations.
pub type RpcResult<T> = Result<T, RpcError>;
