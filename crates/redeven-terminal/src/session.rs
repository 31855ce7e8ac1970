use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};

use crate::history::HistoryRing;
use crate::ids::{ConnId, TerminalSessionId};
use crate::pty::{ExitReason, PtyHandle};

/// How the output fan-out delivers to each attached client: the agent
/// writes into a bounded channel per sink; if the client can't keep up
/// the sink is dropped rather than stalling the PTY reader.
const OUTPUT_SINK_CAPACITY: usize = 256;
const CWD_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(2);

/// Terminal-stream notifications delivered to attached clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TerminalEvent {
    /// `terminal/output`.
    #[serde(rename = "terminal/output")]
    Output {
        /// The session this output came from.
        session_id: TerminalSessionId,
        /// Base64-encoded raw bytes.
        data_b64: String,
        /// Strictly increasing per-session sequence number.
        sequence: u64,
        /// When this chunk was produced.
        timestamp_ms: i64,
        /// True if this chunk is an echo of input just written by a client.
        echo_of_input: bool,
        /// The `conn_id` that wrote the input this chunk echoes, if any.
        original_source: Option<String>,
    },
    /// `terminal/name_update`.
    #[serde(rename = "terminal/name_update")]
    NameUpdate {
        /// The session whose name or working directory changed.
        session_id: TerminalSessionId,
        /// The session's new display name.
        new_name: String,
        /// The detected current working directory.
        working_dir: String,
    },
}

/// Why a `terminal/sessions_changed` notification was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionsChangedReason {
    /// A new session was created.
    Created,
    /// The session's PTY process exited on its own.
    Closed,
    /// The session was explicitly deleted.
    Deleted,
}

/// `terminal/sessions_changed`: broadcast to every attached RPC stream so
/// UIs refresh their session list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsChangedEvent {
    /// Why this notification fired.
    pub reason: SessionsChangedReason,
    /// The affected session, if any.
    pub session_id: Option<TerminalSessionId>,
    /// When this event fired.
    pub timestamp_ms: i64,
}

/// `stats(session_id)` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalStats {
    /// Bytes currently retained in the history ring.
    pub total_bytes: usize,
}

/// Lifecycle state of a terminal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The PTY process is alive.
    Running,
    /// The child process exited on its own.
    Exited,
    /// The session was explicitly deleted.
    Killed,
}

/// A point-in-time view of a terminal session, as returned by `list()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSessionSnapshot {
    /// The session's id.
    pub session_id: TerminalSessionId,
    /// The session's current display name.
    pub name: String,
    /// The best-effort current working directory.
    pub working_dir: String,
    /// When the session was created.
    pub created_at_unix_ms: i64,
    /// `true` if the PTY process is still running.
    pub running: bool,
}

pub(crate) struct SessionHandle {
    pub(crate) id: TerminalSessionId,
    pub(crate) created_at_unix_ms: i64,
    pub(crate) name: tokio::sync::Mutex<String>,
    pub(crate) cwd: tokio::sync::Mutex<PathBuf>,
    pub(crate) state: tokio::sync::Mutex<SessionState>,
    pub(crate) history: tokio::sync::Mutex<HistoryRing>,
    pub(crate) sinks: tokio::sync::Mutex<HashMap<ConnId, mpsc::Sender<TerminalEvent>>>,
    pub(crate) active_attacher: tokio::sync::Mutex<Option<ConnId>>,
    pub(crate) pty: PtyHandle,
    explicitly_deleted: AtomicBool,
}

impl SessionHandle {
    pub(crate) fn new(
        id: TerminalSessionId,
        name: String,
        cwd: PathBuf,
        pty: PtyHandle,
        history_budget_bytes: usize,
        now_unix_ms: i64,
    ) -> Self {
        Self {
            id,
            created_at_unix_ms: now_unix_ms,
            name: tokio::sync::Mutex::new(name),
            cwd: tokio::sync::Mutex::new(cwd),
            state: tokio::sync::Mutex::new(SessionState::Running),
            history: tokio::sync::Mutex::new(HistoryRing::new(history_budget_bytes)),
            sinks: tokio::sync::Mutex::new(HashMap::new()),
            active_attacher: tokio::sync::Mutex::new(None),
            pty,
            explicitly_deleted: AtomicBool::new(false),
        }
    }

    pub(crate) fn mark_explicitly_deleted(&self) {
        self.explicitly_deleted.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn snapshot(&self) -> TerminalSessionSnapshot {
        TerminalSessionSnapshot {
            session_id: self.id.clone(),
            name: self.name.lock().await.clone(),
            working_dir: self.cwd.lock().await.display().to_string(),
            created_at_unix_ms: self.created_at_unix_ms,
            running: *self.state.lock().await == SessionState::Running,
        }
    }
}

/// Owns the per-session output distribution loop: reads raw PTY chunks,
/// stamps and retains them in the history ring, fans them out to every
/// attached sink (dropping sinks that can't keep up), and does periodic
/// best-effort CWD detection. Runs until the PTY reader closes.
pub(crate) async fn run_distributor(
    handle: Arc<SessionHandle>,
    mut raw_rx: mpsc::Receiver<Vec<u8>>,
    sessions: Arc<RwLock<HashMap<TerminalSessionId, Arc<SessionHandle>>>>,
    sessions_changed_tx: broadcast::Sender<SessionsChangedEvent>,
) {
    let mut cwd_interval = tokio::time::interval(CWD_POLL_INTERVAL);
    cwd_interval.tick().await; // the first tick fires immediately

    loop {
        tokio::select! {
            maybe_chunk = raw_rx.recv() => {
                match maybe_chunk {
                    Some(bytes) => distribute_output(&handle, bytes, false, None).await,
                    None => break,
                }
            }
            _ = cwd_interval.tick() => {
                update_cwd_if_changed(&handle).await;
            }
        }
    }

    let mut state = handle.state.lock().await;
    if *state == SessionState::Running {
        *state = SessionState::Exited;
    }
    drop(state);

    handle.sinks.lock().await.clear();
    sessions.write().await.remove(&handle.id);

    if !handle.explicitly_deleted.load(Ordering::SeqCst) {
        let _ = sessions_changed_tx.send(SessionsChangedEvent {
            reason: SessionsChangedReason::Closed,
            session_id: Some(handle.id.clone()),
            timestamp_ms: now_unix_ms(),
        });
    }

    tracing::info!(session_id = %handle.id, "terminal session closed");
}

/// Log the eventual exit code once the child terminates. Lifecycle
/// teardown is driven by the PTY reader's EOF in [`run_distributor`], not
/// by this task.
pub(crate) fn spawn_exit_logger(session_id: TerminalSessionId, exit_rx: oneshot::Receiver<ExitReason>) {
    tokio::spawn(async move {
        if let Ok(reason) = exit_rx.await {
            match reason {
                ExitReason::Exited(code) => {
                    tracing::info!(%session_id, code, "terminal child process exited");
                }
                ExitReason::Eof => {
                    tracing::info!(%session_id, "terminal child process stream reached EOF");
                }
            }
        }
    });
}

async fn distribute_output(handle: &SessionHandle, bytes: Vec<u8>, echo_of_input: bool, original_source: Option<String>) {
    let timestamp_ms = now_unix_ms();
    let chunk = handle.history.lock().await.push(bytes.clone(), timestamp_ms);

    let event = TerminalEvent::Output {
        session_id: handle.id.clone(),
        data_b64: BASE64.encode(&bytes),
        sequence: chunk.sequence,
        timestamp_ms,
        echo_of_input,
        original_source,
    };

    let mut sinks = handle.sinks.lock().await;
    sinks.retain(|conn_id, sink| match sink.try_send(event.clone()) {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!(session_id = %handle.id, %conn_id, "detaching terminal sink: send buffer full");
            false
        }
    });
}

#[cfg(unix)]
async fn update_cwd_if_changed(handle: &SessionHandle) {
    let Some(pid) = handle.pty.pid else { return };
    let link = format!("/proc/{pid}/cwd");
    let Ok(resolved) = tokio::fs::read_link(&link).await else { return };

    let mut cwd = handle.cwd.lock().await;
    if *cwd == resolved {
        return;
    }
    *cwd = resolved.clone();
    let new_name = resolved.file_name().map_or_else(|| "/".to_string(), |name| name.to_string_lossy().into_owned());
    *handle.name.lock().await = new_name.clone();
    drop(cwd);

    let working_dir = resolved.display().to_string();
    let event = TerminalEvent::NameUpdate { session_id: handle.id.clone(), new_name, working_dir };
    let mut sinks = handle.sinks.lock().await;
    sinks.retain(|conn_id, sink| match sink.try_send(event.clone()) {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!(session_id = %handle.id, %conn_id, "detaching terminal sink: send buffer full");
            false
        }
    });
}

#[cfg(not(unix))]
async fn update_cwd_if_changed(_handle: &SessionHandle) {}

pub(crate) fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) const fn output_sink_capacity() -> usize {
    OUTPUT_SINK_CAPACITY
}
