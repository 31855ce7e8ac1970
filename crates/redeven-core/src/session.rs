use serde::{Deserialize, Serialize};

use redeven_permissions::PermissionSet;

use crate::ChannelId;

/// The application kinds the agent knows how to serve a tunnel session for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloeApp {
    /// The virtual filesystem browser.
    Filesystem,
    /// An interactive terminal.
    Terminal,
    /// The host resource monitor.
    Monitor,
    /// Management RPCs over the active session list.
    Sessions,
}

impl FloeApp {
    /// The app id used as the `by_app` key in
    /// [`redeven_permissions::PermissionPolicy`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Terminal => "terminal",
            Self::Monitor => "monitor",
            Self::Sessions => "sessions",
        }
    }
}

/// Authoritative metadata for one session, frozen once accepted.
///
/// `endpoint_id` must equal the agent's configured environment id; the
/// caller is responsible for checking this before the session is admitted
/// (see `redeven-agent`'s acceptance pipeline). Every field here is set once
/// at acceptance time and never mutated — the registry and every RPC
/// handler read the same frozen value for the lifetime of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Unique id for this tunnel session.
    pub channel_id: ChannelId,
    /// The environment id this grant was issued for; must match the
    /// agent's configured environment id.
    pub endpoint_id: String,
    /// Which application protocol this session serves.
    pub floe_app: FloeApp,
    /// Optional code-space identifier, when the grant targets one.
    pub code_space_id: Option<String>,
    /// Stable public id of the user who requested the session.
    pub user_public_id: String,
    /// The user's email, for audit logging.
    pub user_email: String,
    /// The effective permission set: already `granted ∩ local_cap(user, app)`.
    ///
    /// This is computed once, at acceptance time, by intersecting the
    /// grant's declared permissions with [`redeven_permissions::PermissionPolicy::resolve`].
    /// No handler re-reads permissions from the network.
    pub permissions: PermissionSet,
}

/// Registry value for one live session.
///
/// `connected_at_unix_ms` is `0` while the tunnel is still being
/// established, and is set exactly once when it succeeds.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    /// The frozen metadata for this session.
    pub meta: SessionMeta,
    /// Milliseconds since the Unix epoch when the tunnel connected, or `0`
    /// if it has not connected yet.
    pub connected_at_unix_ms: i64,
}

impl ActiveSession {
    /// Create a new registry entry in the "connecting" state.
    #[must_use]
    pub const fn connecting(meta: SessionMeta) -> Self {
        Self {
            meta,
            connected_at_unix_ms: 0,
        }
    }

    /// Whether the tunnel has ever successfully connected.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected_at_unix_ms > 0
    }
}
