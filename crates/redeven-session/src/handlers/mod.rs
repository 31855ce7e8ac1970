//! The `rpc` sub-stream's handler table and its background notify forwarders.

mod fs;
mod monitor;
mod sessions;
mod sys;
mod terminal;

use std::sync::Arc;

use redeven_monitor::MonitorService;
use redeven_registry::SessionRegistry;
use redeven_rpc::{HandlerMap, HandlerMapBuilder, OutboundNotify};
use redeven_terminal::TerminalManager;
use redeven_vfs::FsService;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::type_id;

/// The agent-side services one tunnel session's `rpc` sub-stream dispatches
/// into. Cloning is cheap: every field is itself a handle.
#[derive(Clone)]
pub struct SharedServices {
    /// Filesystem operations, rooted and permission-checked per call.
    pub fs: FsService,
    /// The agent's one terminal manager, shared across every concurrently
    /// attached stream.
    pub terminal: Arc<TerminalManager>,
    /// The agent's one host-monitor service.
    pub monitor: Arc<MonitorService>,
    /// The supervisor's live-session registry, for `sessions/list_active`.
    pub registry: SessionRegistry,
}

/// Build the full handler table for one `rpc` sub-stream.
///
/// `notify_tx` is this stream's outbound-notify sender: handlers that spawn
/// background forwarders (`terminal/attach`) clone it to push later
/// `terminal/output` and `terminal/name_update` notifications.
#[must_use]
pub fn build_handler_map(services: &SharedServices, notify_tx: mpsc::Sender<OutboundNotify>) -> HandlerMap {
    HandlerMapBuilder::new()
        .with(type_id::fs::LIST, Arc::new(fs::ListHandler(services.fs.clone())))
        .with(type_id::fs::READ, Arc::new(fs::ReadHandler(services.fs.clone())))
        .with(type_id::fs::WRITE, Arc::new(fs::WriteHandler(services.fs.clone())))
        .with(type_id::fs::DELETE, Arc::new(fs::DeleteHandler(services.fs.clone())))
        .with(type_id::fs::GET_HOME, Arc::new(fs::GetHomeHandler(services.fs.clone())))
        .with(type_id::terminal::CREATE, Arc::new(terminal::CreateHandler(Arc::clone(&services.terminal))))
        .with(type_id::terminal::LIST, Arc::new(terminal::ListHandler(Arc::clone(&services.terminal))))
        .with(
            type_id::terminal::ATTACH,
            Arc::new(terminal::AttachHandler { manager: Arc::clone(&services.terminal), notify_tx: notify_tx.clone() }),
        )
        .with(type_id::terminal::DELETE, Arc::new(terminal::DeleteHandler(Arc::clone(&services.terminal))))
        .with(type_id::terminal::HISTORY, Arc::new(terminal::HistoryHandler(Arc::clone(&services.terminal))))
        .with(type_id::terminal::CLEAR, Arc::new(terminal::ClearHandler(Arc::clone(&services.terminal))))
        .with(type_id::terminal::STATS, Arc::new(terminal::StatsHandler(Arc::clone(&services.terminal))))
        .with(type_id::terminal::INPUT, Arc::new(terminal::InputHandler(Arc::clone(&services.terminal))))
        .with(type_id::terminal::RESIZE, Arc::new(terminal::ResizeHandler(Arc::clone(&services.terminal))))
        .with(type_id::monitor::MONITOR, Arc::new(monitor::MonitorHandler(Arc::clone(&services.monitor))))
        .with(type_id::sys::INFO, Arc::new(sys::SysInfoHandler))
        .with(type_id::sessions::LIST_ACTIVE, Arc::new(sessions::ListActiveHandler(services.registry.clone())))
        .build()
}

/// Forward `terminal/sessions_changed` events onto `notify_tx` until the
/// session's tunnel closes. Spawned once per `rpc` sub-stream, alongside the
/// dispatcher itself.
pub async fn forward_sessions_changed(terminal: Arc<TerminalManager>, notify_tx: mpsc::Sender<OutboundNotify>, cancellation: CancellationToken) {
    let mut events_rx = terminal.subscribe_sessions_changed();
    loop {
        tokio::select! {
            () = cancellation.cancelled() => break,
            event = events_rx.recv() => {
                match event {
                    Ok(event) => {
                        if notify_tx.send(OutboundNotify::new(type_id::terminal::SESSIONS_CHANGED, &event)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
