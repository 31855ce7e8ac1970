//! Terminal request/notify handlers (type ids 2001-2012).
//!
//! `terminal/output`, `terminal/name_update`, and `terminal/sessions_changed`
//! (2008, 2011, 2012) never arrive as inbound requests; they are pushed onto
//! the stream's [`OutboundNotify`] channel by the forwarding task spawned
//! from [`AttachHandler::handle`] and by [`super::forward_sessions_changed`].

use std::sync::Arc;

use redeven_core::AgentError;
use redeven_rpc::{OutboundNotify, RpcContext, RpcHandler};
use redeven_terminal::{ConnId, TerminalEvent, TerminalManager, TerminalSessionId};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::type_id;

fn conn_id_for(ctx: &RpcContext) -> ConnId {
    ConnId(ctx.channel_id.as_str().to_string())
}

/// `terminal/create` (2001).
pub struct CreateHandler(pub Arc<TerminalManager>);

#[derive(Deserialize)]
struct CreateRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    working_dir: Option<String>,
    #[serde(default = "default_cols")]
    cols: u16,
    #[serde(default = "default_rows")]
    rows: u16,
}

fn default_cols() -> u16 {
    80
}

fn default_rows() -> u16 {
    24
}

#[async_trait::async_trait]
impl RpcHandler for CreateHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: CreateRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        let snapshot = self.0.create(ctx.permissions, request.name, request.working_dir.as_deref(), request.cols, request.rows).await?;
        Ok(serde_json::json!(snapshot))
    }
}

/// `terminal/list` (2002).
pub struct ListHandler(pub Arc<TerminalManager>);

#[async_trait::async_trait]
impl RpcHandler for ListHandler {
    async fn handle(&self, ctx: &RpcContext, _payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let sessions = self.0.list(ctx.permissions).await?;
        Ok(serde_json::json!({ "sessions": sessions }))
    }
}

/// `terminal/attach` (2003). Spawns a forwarding task that turns the
/// session's [`TerminalEvent`]s into `terminal/output`/`terminal/name_update`
/// notifications on this stream.
pub struct AttachHandler {
    /// The shared terminal manager.
    pub manager: Arc<TerminalManager>,
    /// This stream's outbound-notify sender, shared with its [`redeven_rpc::Dispatcher`].
    pub notify_tx: mpsc::Sender<OutboundNotify>,
}

#[derive(Deserialize)]
struct AttachRequest {
    session_id: String,
    #[serde(default = "default_cols")]
    cols: u16,
    #[serde(default = "default_rows")]
    rows: u16,
}

#[async_trait::async_trait]
impl RpcHandler for AttachHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: AttachRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        let session_id = TerminalSessionId(request.session_id);
        let conn_id = conn_id_for(ctx);

        let events_rx = self.manager.attach(ctx.permissions, &session_id, conn_id.clone(), request.cols, request.rows).await?;

        let manager = Arc::clone(&self.manager);
        let notify_tx = self.notify_tx.clone();
        let cancellation = ctx.cancellation.clone();
        tokio::spawn(forward_terminal_events(manager, session_id, conn_id, events_rx, notify_tx, cancellation));

        Ok(serde_json::json!({}))
    }
}

async fn forward_terminal_events(
    manager: Arc<TerminalManager>,
    session_id: TerminalSessionId,
    conn_id: ConnId,
    mut events_rx: mpsc::Receiver<TerminalEvent>,
    notify_tx: mpsc::Sender<OutboundNotify>,
    cancellation: tokio_util::sync::CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancellation.cancelled() => break,
            event = events_rx.recv() => {
                match event {
                    Some(event) => {
                        let type_id = match event {
                            TerminalEvent::Output { .. } => type_id::terminal::OUTPUT,
                            TerminalEvent::NameUpdate { .. } => type_id::terminal::NAME_UPDATE,
                        };
                        if notify_tx.send(OutboundNotify::new(type_id, &event)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
    manager.detach(&session_id, &conn_id).await;
}

/// `terminal/delete` (2004).
pub struct DeleteHandler(pub Arc<TerminalManager>);

#[derive(Deserialize)]
struct SessionIdRequest {
    session_id: String,
}

#[async_trait::async_trait]
impl RpcHandler for DeleteHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: SessionIdRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        self.0.delete(ctx.permissions, &TerminalSessionId(request.session_id)).await?;
        Ok(serde_json::json!({}))
    }
}

/// `terminal/history` (2005).
pub struct HistoryHandler(pub Arc<TerminalManager>);

#[derive(Deserialize)]
struct HistoryRequest {
    session_id: String,
    #[serde(default)]
    start_seq: u64,
    #[serde(default)]
    end_seq: u64,
}

#[async_trait::async_trait]
impl RpcHandler for HistoryHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: HistoryRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        let chunks = self.0.history(ctx.permissions, &TerminalSessionId(request.session_id), request.start_seq, request.end_seq).await?;
        Ok(serde_json::json!({ "chunks": chunks }))
    }
}

/// `terminal/clear` (2006).
pub struct ClearHandler(pub Arc<TerminalManager>);

#[async_trait::async_trait]
impl RpcHandler for ClearHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: SessionIdRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        self.0.clear(ctx.permissions, &TerminalSessionId(request.session_id)).await?;
        Ok(serde_json::json!({}))
    }
}

/// `terminal/stats` (2007).
pub struct StatsHandler(pub Arc<TerminalManager>);

#[async_trait::async_trait]
impl RpcHandler for StatsHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: SessionIdRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        let stats = self.0.stats(ctx.permissions, &TerminalSessionId(request.session_id)).await?;
        Ok(serde_json::json!(stats))
    }
}

/// `terminal/input` (2009). Arrives as a `Notify` frame; errors are logged
/// by the dispatcher, no reply is sent.
pub struct InputHandler(pub Arc<TerminalManager>);

#[derive(Deserialize)]
struct InputRequest {
    session_id: String,
    data_b64: String,
}

#[async_trait::async_trait]
impl RpcHandler for InputHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        use base64::Engine as _;
        let request: InputRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(&request.data_b64)
            .map_err(|source| AgentError::InvalidRequest(format!("invalid base64 input: {source}")))?;
        let conn_id = conn_id_for(ctx);
        self.0.write_input(&TerminalSessionId(request.session_id), &conn_id, data).await?;
        Ok(serde_json::json!({}))
    }
}

/// `terminal/resize` (2010). Arrives as a `Notify` frame.
pub struct ResizeHandler(pub Arc<TerminalManager>);

#[derive(Deserialize)]
struct ResizeRequest {
    session_id: String,
    cols: u16,
    rows: u16,
}

#[async_trait::async_trait]
impl RpcHandler for ResizeHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: ResizeRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        let conn_id = conn_id_for(ctx);
        self.0.resize(&TerminalSessionId(request.session_id), &conn_id, request.cols, request.rows).await?;
        Ok(serde_json::json!({}))
    }
}
