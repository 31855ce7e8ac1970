//! The serializable projection of a registry entry returned by `list_active`.

use redeven_core::{ActiveSession, FloeApp};
use serde::Serialize;

/// One row of the `sessions/list_active` reply.
///
/// Deliberately narrower than [`redeven_core::SessionMeta`]: permissions and
/// `code_space_id` are internal bookkeeping, not part of the operator-facing
/// listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSessionSummary {
    /// The session's tunnel id.
    pub channel_id: String,
    /// The environment id the session was granted for.
    pub endpoint_id: String,
    /// Which application protocol the session serves.
    pub floe_app: FloeApp,
    /// Stable public id of the connected user.
    pub user_public_id: String,
    /// The connected user's email.
    pub user_email: String,
    /// Milliseconds since the Unix epoch when the tunnel connected.
    pub connected_at_unix_ms: i64,
}

impl ActiveSessionSummary {
    /// Project a live [`ActiveSession`] into its listing row.
    #[must_use]
    pub fn from_active(active: &ActiveSession) -> Self {
        Self {
            channel_id: active.meta.channel_id.as_str().to_string(),
            endpoint_id: active.meta.endpoint_id.clone(),
            floe_app: active.meta.floe_app,
            user_public_id: active.meta.user_public_id.clone(),
            user_email: active.meta.user_email.clone(),
            connected_at_unix_ms: active.connected_at_unix_ms,
        }
    }
}
