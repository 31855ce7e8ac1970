/// Errors produced by the control-channel client.
///
/// None of these are fatal to the process: the outer reconnect loop in
/// [`crate::client`] catches every variant except [`ControlError::Shutdown`]
/// and retries after backoff.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// `WebSocket` transport error.
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The coordinator closed the connection.
    #[error("connection closed with code {0}")]
    Closed(u16),

    /// `register` was rejected by the coordinator.
    #[error("register rejected: {0}")]
    RegisterFailed(String),

    /// No reply to `register` arrived before the timeout.
    #[error("timed out waiting for register reply")]
    RegisterTimeout,

    /// Malformed or unexpected message from the coordinator.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The agent's root context was cancelled.
    #[error("shutdown requested")]
    Shutdown,
}

impl From<tokio_tungstenite::tungstenite::Error> for ControlError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Convenience alias.
pub type ControlResult<T> = Result<T, ControlError>;
