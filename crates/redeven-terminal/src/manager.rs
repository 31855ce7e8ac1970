use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use redeven_permissions::PermissionSet;
use tokio::sync::{RwLock, broadcast, mpsc};

use crate::error::{TerminalError, TerminalResult};
use crate::history::HistoryChunk;
use crate::ids::{ConnId, TerminalSessionId};
use crate::pty;
use crate::session::{
    self, SessionHandle, SessionState, SessionsChangedEvent, SessionsChangedReason, TerminalEvent, TerminalSessionSnapshot, TerminalStats,
};

/// Tuning knobs for [`TerminalManager`].
#[derive(Debug, Clone)]
pub struct TerminalManagerConfig {
    /// The shell binary to spawn for new sessions, e.g. `/bin/bash`.
    pub shell: String,
    /// Root directory sessions are rooted under when no `working_dir` is
    /// given, or when the requested one resolves outside the workspace.
    pub root: PathBuf,
    /// Per-session history ring budget, in bytes.
    pub history_budget_bytes: usize,
}

impl Default for TerminalManagerConfig {
    fn default() -> Self {
        Self { shell: default_shell(), root: PathBuf::from("/"), history_budget_bytes: 1_000_000 }
    }
}

fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

/// Owns every PTY-backed terminal session for the agent.
pub struct TerminalManager {
    config: TerminalManagerConfig,
    sessions: Arc<RwLock<HashMap<TerminalSessionId, Arc<SessionHandle>>>>,
    sessions_changed_tx: broadcast::Sender<SessionsChangedEvent>,
}

impl TerminalManager {
    /// Build an empty manager. No sessions are spawned until [`Self::create`] is called.
    #[must_use]
    pub fn new(config: TerminalManagerConfig) -> Self {
        let (sessions_changed_tx, _) = broadcast::channel(256);
        Self { config, sessions: Arc::new(RwLock::new(HashMap::new())), sessions_changed_tx }
    }

    /// Subscribe to `terminal/sessions_changed` notifications.
    #[must_use]
    pub fn subscribe_sessions_changed(&self) -> broadcast::Receiver<SessionsChangedEvent> {
        self.sessions_changed_tx.subscribe()
    }

    /// Spawn a new terminal session. Requires `execute`.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::PermissionDenied`] without `execute`,
    /// [`TerminalError::Conflict`] if `name` is already in use, or
    /// [`TerminalError::Unavailable`] if the PTY could not be allocated.
    pub async fn create(
        &self,
        permissions: PermissionSet,
        name: Option<String>,
        working_dir: Option<&str>,
        cols: u16,
        rows: u16,
    ) -> TerminalResult<TerminalSessionSnapshot> {
        if !permissions.execute {
            return Err(TerminalError::PermissionDenied("execute permission required to create a terminal session".to_string()));
        }

        let id = TerminalSessionId::new();
        let name = name.unwrap_or_else(|| format!("terminal-{}", &id.0[..8]));

        {
            let sessions = self.sessions.read().await;
            for existing in sessions.values() {
                if *existing.name.lock().await == name {
                    return Err(TerminalError::Conflict(format!("a terminal session named {name:?} already exists")));
                }
            }
        }

        let cwd = self.resolve_working_dir(working_dir);
        let (pty_handle, output_rx, exit_rx) = pty::spawn(&self.config.shell, &cwd, cols, rows)?;

        let now = session::now_unix_ms();
        let handle = Arc::new(SessionHandle::new(id.clone(), name, cwd, pty_handle, self.config.history_budget_bytes, now));

        self.sessions.write().await.insert(id.clone(), Arc::clone(&handle));

        session::spawn_exit_logger(id.clone(), exit_rx);
        tokio::spawn(session::run_distributor(Arc::clone(&handle), output_rx, Arc::clone(&self.sessions), self.sessions_changed_tx.clone()));

        let _ = self.sessions_changed_tx.send(SessionsChangedEvent {
            reason: SessionsChangedReason::Created,
            session_id: Some(id),
            timestamp_ms: now,
        });

        Ok(handle.snapshot().await)
    }

    fn resolve_working_dir(&self, working_dir: Option<&str>) -> PathBuf {
        let Some(requested) = working_dir else { return self.config.root.clone() };
        let (_, real_path) = redeven_vfs::resolve_path(&self.config.root, requested);
        real_path
    }

    /// List every live session, oldest first. Requires `read`.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::PermissionDenied`] without `read`.
    pub async fn list(&self, permissions: PermissionSet) -> TerminalResult<Vec<TerminalSessionSnapshot>> {
        if !permissions.read {
            return Err(TerminalError::PermissionDenied("read permission required to list terminal sessions".to_string()));
        }
        let sessions = self.sessions.read().await;
        let mut handles: Vec<&Arc<SessionHandle>> = sessions.values().collect();
        handles.sort_by_key(|handle| handle.created_at_unix_ms);
        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            snapshots.push(handle.snapshot().await);
        }
        Ok(snapshots)
    }

    /// Attach a client to a session's output stream, applying `(cols, rows)`
    /// as the session's authoritative size. Requires `execute`.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::PermissionDenied`] without `execute`, or
    /// [`TerminalError::NotFound`] if `session_id` is unknown.
    pub async fn attach(
        &self,
        permissions: PermissionSet,
        session_id: &TerminalSessionId,
        conn_id: ConnId,
        cols: u16,
        rows: u16,
    ) -> TerminalResult<mpsc::Receiver<TerminalEvent>> {
        if !permissions.execute {
            return Err(TerminalError::PermissionDenied("execute permission required to attach to a terminal session".to_string()));
        }
        let handle = self.find(session_id).await?;

        let (tx, rx) = mpsc::channel(session::output_sink_capacity());
        handle.sinks.lock().await.insert(conn_id.clone(), tx);
        *handle.active_attacher.lock().await = Some(conn_id);
        handle.pty.resize(cols, rows).await;

        Ok(rx)
    }

    /// Detach a client from a session's output stream. A no-op if
    /// `conn_id` was never attached, or `session_id` no longer exists.
    pub async fn detach(&self, session_id: &TerminalSessionId, conn_id: &ConnId) {
        let Ok(handle) = self.find(session_id).await else { return };
        handle.sinks.lock().await.remove(conn_id);
        let mut active = handle.active_attacher.lock().await;
        if active.as_ref() == Some(conn_id) {
            *active = None;
        }
    }

    /// Write input to a session's stdin. Only honored while `conn_id` is
    /// attached.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::NotFound`] if `session_id` is unknown, or
    /// [`TerminalError::PermissionDenied`] if `conn_id` is not attached.
    pub async fn write_input(&self, session_id: &TerminalSessionId, conn_id: &ConnId, data: Vec<u8>) -> TerminalResult<()> {
        let handle = self.find(session_id).await?;
        if !handle.sinks.lock().await.contains_key(conn_id) {
            return Err(TerminalError::PermissionDenied(format!("{conn_id} is not attached to this session")));
        }
        handle.pty.write_input(data).await
    }

    /// Resize a session's PTY. Only honored for the most recently attached
    /// client (the current interactive owner).
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::NotFound`] if `session_id` is unknown.
    pub async fn resize(&self, session_id: &TerminalSessionId, conn_id: &ConnId, cols: u16, rows: u16) -> TerminalResult<()> {
        let handle = self.find(session_id).await?;
        if handle.active_attacher.lock().await.as_ref() != Some(conn_id) {
            return Ok(());
        }
        handle.pty.resize(cols, rows).await;
        Ok(())
    }

    /// Kill and remove a session. Requires `execute`.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::PermissionDenied`] without `execute`, or
    /// [`TerminalError::NotFound`] if `session_id` is unknown.
    pub async fn delete(&self, permissions: PermissionSet, session_id: &TerminalSessionId) -> TerminalResult<()> {
        if !permissions.execute {
            return Err(TerminalError::PermissionDenied("execute permission required to delete a terminal session".to_string()));
        }
        let handle = self.find(session_id).await?;
        handle.mark_explicitly_deleted();
        *handle.state.lock().await = SessionState::Killed;
        handle.pty.kill();
        handle.sinks.lock().await.clear();
        self.sessions.write().await.remove(session_id);

        let _ = self.sessions_changed_tx.send(SessionsChangedEvent {
            reason: SessionsChangedReason::Deleted,
            session_id: Some(session_id.clone()),
            timestamp_ms: session::now_unix_ms(),
        });
        Ok(())
    }

    /// Fetch retained history chunks in `[start_seq..=end_seq]`
    /// (`end_seq == 0` means "up to latest"). Requires `read`.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::PermissionDenied`] without `read`, or
    /// [`TerminalError::NotFound`] if `session_id` is unknown.
    pub async fn history(&self, permissions: PermissionSet, session_id: &TerminalSessionId, start_seq: u64, end_seq: u64) -> TerminalResult<Vec<HistoryChunk>> {
        if !permissions.read {
            return Err(TerminalError::PermissionDenied("read permission required to read terminal history".to_string()));
        }
        let handle = self.find(session_id).await?;
        Ok(handle.history.lock().await.range(start_seq, end_seq))
    }

    /// Drop all retained history for a session, without touching its
    /// sequence counter. Requires `execute`.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::PermissionDenied`] without `execute`, or
    /// [`TerminalError::NotFound`] if `session_id` is unknown.
    pub async fn clear(&self, permissions: PermissionSet, session_id: &TerminalSessionId) -> TerminalResult<()> {
        if !permissions.execute {
            return Err(TerminalError::PermissionDenied("execute permission required to clear terminal history".to_string()));
        }
        let handle = self.find(session_id).await?;
        handle.history.lock().await.clear();
        Ok(())
    }

    /// Fetch a session's retained-history byte count. Requires `read`.
    ///
    /// # Errors
    ///
    /// Returns [`TerminalError::PermissionDenied`] without `read`, or
    /// [`TerminalError::NotFound`] if `session_id` is unknown.
    pub async fn stats(&self, permissions: PermissionSet, session_id: &TerminalSessionId) -> TerminalResult<TerminalStats> {
        if !permissions.read {
            return Err(TerminalError::PermissionDenied("read permission required to read terminal stats".to_string()));
        }
        let handle = self.find(session_id).await?;
        Ok(TerminalStats { total_bytes: handle.history.lock().await.total_bytes() })
    }

    /// Kill every live session's PTY child process. Called during agent
    /// shutdown so no terminal child outlives the agent.
    pub async fn shutdown(&self) {
        let sessions = self.sessions.read().await;
        for handle in sessions.values() {
            handle.mark_explicitly_deleted();
            handle.pty.kill();
        }
    }

    async fn find(&self, session_id: &TerminalSessionId) -> TerminalResult<Arc<SessionHandle>> {
        self.sessions.read().await.get(session_id).cloned().ok_or_else(|| TerminalError::NotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_shell(shell: &str, root: &Path) -> TerminalManagerConfig {
        TerminalManagerConfig { shell: shell.to_string(), root: root.to_path_buf(), history_budget_bytes: 1_000_000 }
    }

    #[tokio::test]
    async fn create_requires_execute_permission() {
        let manager = TerminalManager::new(config_with_shell("/bin/sh", Path::new("/tmp")));
        let permissions = PermissionSet { read: true, write: true, execute: false };
        let result = manager.create(permissions, None, None, 80, 24).await;
        assert!(matches!(result, Err(TerminalError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn list_requires_read_permission() {
        let manager = TerminalManager::new(config_with_shell("/bin/sh", Path::new("/tmp")));
        let permissions = PermissionSet { read: false, write: false, execute: true };
        let result = manager.list(permissions).await;
        assert!(matches!(result, Err(TerminalError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn operations_on_unknown_session_are_not_found() {
        let manager = TerminalManager::new(config_with_shell("/bin/sh", Path::new("/tmp")));
        let permissions = PermissionSet::all();
        let unknown = TerminalSessionId::new();
        assert!(matches!(manager.delete(permissions, &unknown).await, Err(TerminalError::NotFound(_))));
        assert!(matches!(manager.stats(permissions, &unknown).await, Err(TerminalError::NotFound(_))));
        assert!(matches!(manager.history(permissions, &unknown, 0, 0).await, Err(TerminalError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_list_and_delete_round_trip() {
        let manager = TerminalManager::new(config_with_shell("/bin/sh", Path::new("/tmp")));
        let permissions = PermissionSet::all();

        let snapshot = manager.create(permissions, Some("test-shell".to_string()), None, 80, 24).await.expect("create succeeds");
        assert_eq!(snapshot.name, "test-shell");
        assert!(snapshot.running);

        let listed = manager.list(permissions).await.expect("list succeeds");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].session_id, snapshot.session_id);

        manager.delete(permissions, &snapshot.session_id).await.expect("delete succeeds");
        let listed = manager.list(permissions).await.expect("list succeeds");
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn duplicate_name_is_a_conflict() {
        let manager = TerminalManager::new(config_with_shell("/bin/sh", Path::new("/tmp")));
        let permissions = PermissionSet::all();
        manager.create(permissions, Some("dup".to_string()), None, 80, 24).await.expect("first create succeeds");
        let result = manager.create(permissions, Some("dup".to_string()), None, 80, 24).await;
        assert!(matches!(result, Err(TerminalError::Conflict(_))));
    }
}
