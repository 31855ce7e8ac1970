use thiserror::Error;

/// Why a tunnel session ended, for structured shutdown logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The tunnel socket closed cleanly (EOF / close frame).
    Eof,
    /// The initial connect to `tunnel_url` failed.
    ConnectFailed,
    /// The owning registry entry's cancellation token fired.
    Canceled,
    /// A transport or protocol error ended the session.
    Error,
}

impl CloseReason {
    /// The lowercase classification string used in shutdown logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eof => "eof",
            Self::ConnectFailed => "connect_failed",
            Self::Canceled => "canceled",
            Self::Error => "error",
        }
    }
}

/// Errors produced while running one tunnel session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Connecting to `tunnel_url` failed.
    #[error("tunnel connect failed: {0}")]
    ConnectFailed(#[from] Box<tokio_tungstenite::tungstenite::Error>),
    /// The tunnel socket produced a malformed multiplex frame.
    #[error("malformed multiplex frame: {0}")]
    Protocol(String),
    /// An I/O failure while pumping a sub-stream.
    #[error("tunnel io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Classify this error for shutdown logging.
    #[must_use]
    pub const fn close_reason(&self) -> CloseReason {
        match self {
            Self::ConnectFailed(_) => CloseReason::ConnectFailed,
            Self::Protocol(_) | Self::Io(_) => CloseReason::Error,
        }
    }
}

/// Result alias for this crate.
pub type SessionResult<T> = Result<T, SessionError>;
