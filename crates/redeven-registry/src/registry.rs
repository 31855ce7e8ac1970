//! The live session map.
//!
//! Locking discipline: the lock is held only for the map operation itself —
//! insert, lookup, mark-connected, remove — never across an `await` that
//! waits on the tunnel or a handler. A session's own I/O lives entirely
//! outside the registry; the registry only ever answers "is this
//! `channel_id` live, and since when".

use std::collections::HashMap;
use std::sync::Arc;

use redeven_core::{ActiveSession, ChannelId, SessionMeta};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::summary::ActiveSessionSummary;

struct Entry {
    active: ActiveSession,
    cancellation: CancellationToken,
}

/// `channel_id -> ActiveSession` map shared by the supervisor and every
/// accepted tunnel session.
///
/// Invariant: no two entries share a `channel_id` — [`SessionRegistry::insert`]
/// is a no-op, not a replace, when the id is already present.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    entries: Arc<RwLock<HashMap<ChannelId, Entry>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted grant in the "connecting" state.
    ///
    /// Returns the entry's [`CancellationToken`] on success. Returns `None`
    /// if `meta.channel_id` is already registered: only the first delivery
    /// for a `channel_id` instantiates a session; the caller must drop the
    /// duplicate without side effect rather than replacing the existing one.
    pub async fn insert(&self, meta: SessionMeta) -> Option<CancellationToken> {
        let mut guard = self.entries.write().await;
        if guard.contains_key(&meta.channel_id) {
            debug!(channel_id = %meta.channel_id, "duplicate grant for live channel_id, dropping");
            return None;
        }
        let cancellation = CancellationToken::new();
        let channel_id = meta.channel_id.clone();
        guard.insert(channel_id, Entry { active: ActiveSession::connecting(meta), cancellation: cancellation.clone() });
        Some(cancellation)
    }

    /// Mark a registered session's tunnel as connected.
    ///
    /// Returns `false` if `channel_id` is not registered (it may have been
    /// removed or never inserted).
    pub async fn mark_connected(&self, channel_id: &ChannelId, connected_at_unix_ms: i64) -> bool {
        let mut guard = self.entries.write().await;
        let Some(entry) = guard.get_mut(channel_id) else {
            return false;
        };
        entry.active.connected_at_unix_ms = connected_at_unix_ms;
        true
    }

    /// Remove a session, for example once its tunnel has ended.
    pub async fn remove(&self, channel_id: &ChannelId) -> Option<ActiveSession> {
        let mut guard = self.entries.write().await;
        guard.remove(channel_id).map(|entry| entry.active)
    }

    /// Cancel every live session's token and clear the map.
    ///
    /// Called once, from the supervisor's shutdown path, before it awaits
    /// every session task. After this returns, [`SessionRegistry::list_active`]
    /// reports zero sessions immediately — callers do not need to wait for
    /// each session's own teardown to call [`SessionRegistry::remove`].
    pub async fn cancel_all(&self) {
        let mut guard = self.entries.write().await;
        for (channel_id, entry) in guard.drain() {
            debug!(%channel_id, "cancelling session on shutdown");
            entry.cancellation.cancel();
        }
    }

    /// List every connected session, most recently connected first.
    ///
    /// Entries still in the "connecting" state (`connected_at_unix_ms == 0`)
    /// are omitted: a tunnel that never finished connecting was never a
    /// live session from the operator's point of view.
    pub async fn list_active(&self) -> Vec<ActiveSessionSummary> {
        let guard = self.entries.read().await;
        let mut summaries: Vec<ActiveSessionSummary> =
            guard.values().filter(|entry| entry.active.is_connected()).map(|entry| ActiveSessionSummary::from_active(&entry.active)).collect();
        summaries.sort_by(|a, b| b.connected_at_unix_ms.cmp(&a.connected_at_unix_ms));
        summaries
    }

    /// Number of entries currently registered, connecting or connected.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the registry currently holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use redeven_core::FloeApp;
    use redeven_permissions::PermissionSet;

    use super::*;

    fn sample_meta(channel_id: &str) -> SessionMeta {
        SessionMeta {
            channel_id: ChannelId::from(channel_id),
            endpoint_id: "env-1".to_string(),
            floe_app: FloeApp::Terminal,
            code_space_id: None,
            user_public_id: "user-1".to_string(),
            user_email: "user@example.com".to_string(),
            permissions: PermissionSet::all(),
        }
    }

    #[tokio::test]
    async fn insert_then_mark_connected_surfaces_in_list_active() {
        let registry = SessionRegistry::new();
        let token = registry.insert(sample_meta("chan-1")).await.unwrap();
        assert!(!token.is_cancelled());

        assert!(registry.list_active().await.is_empty());

        assert!(registry.mark_connected(&ChannelId::from("chan-1"), 1_000).await);
        let active = registry.list_active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].channel_id, "chan-1");
    }

    #[tokio::test]
    async fn duplicate_channel_id_insert_is_dropped() {
        let registry = SessionRegistry::new();
        assert!(registry.insert(sample_meta("chan-1")).await.is_some());
        assert!(registry.insert(sample_meta("chan-1")).await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn list_active_sorts_by_connected_at_descending() {
        let registry = SessionRegistry::new();
        registry.insert(sample_meta("chan-early")).await;
        registry.insert(sample_meta("chan-late")).await;
        registry.mark_connected(&ChannelId::from("chan-early"), 1_000).await;
        registry.mark_connected(&ChannelId::from("chan-late"), 2_000).await;

        let active = registry.list_active().await;
        assert_eq!(active[0].channel_id, "chan-late");
        assert_eq!(active[1].channel_id, "chan-early");
    }

    #[tokio::test]
    async fn remove_drops_the_entry() {
        let registry = SessionRegistry::new();
        registry.insert(sample_meta("chan-1")).await;
        registry.mark_connected(&ChannelId::from("chan-1"), 1_000).await;

        let removed = registry.remove(&ChannelId::from("chan-1")).await.unwrap();
        assert_eq!(removed.meta.channel_id, ChannelId::from("chan-1"));
        assert!(registry.list_active().await.is_empty());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn cancel_all_cancels_tokens_and_clears_the_map() {
        let registry = SessionRegistry::new();
        let token_a = registry.insert(sample_meta("chan-a")).await.unwrap();
        let token_b = registry.insert(sample_meta("chan-b")).await.unwrap();
        registry.mark_connected(&ChannelId::from("chan-a"), 1_000).await;

        registry.cancel_all().await;

        assert!(token_a.is_cancelled());
        assert!(token_b.is_cancelled());
        assert!(registry.is_empty().await);
        assert!(registry.list_active().await.is_empty());
    }

    #[tokio::test]
    async fn mark_connected_on_unknown_channel_returns_false() {
        let registry = SessionRegistry::new();
        assert!(!registry.mark_connected(&ChannelId::from("ghost"), 1_000).await);
    }
}
