use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt as _;
use redeven_core::{AgentError, WireError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;

use crate::context::RpcContext;
use crate::envelope::{Envelope, FrameKind};
use crate::error::RpcResult;
use crate::handler::HandlerMap;

/// Per-handler JSON payload cap. The `fs/read_file` binary body is framed
/// separately and is not subject to this limit.
const MAX_FRAME_BYTES: u32 = 1024 * 1024;

/// A server-initiated notification queued for delivery on a dispatcher's
/// stream. `terminal/output` and friends are the motivating case: these
/// originate outside any single handler call, from a background fan-out
/// task.
#[derive(Debug, Clone)]
pub struct OutboundNotify {
    /// The notification's type id.
    pub type_id: u32,
    /// The notification's JSON payload.
    pub payload: serde_json::Value,
}

impl OutboundNotify {
    /// Build a notify from any serializable value.
    ///
    /// # Panics
    ///
    /// Panics if `body` fails to serialize to JSON, which only happens for
    /// a type with a broken `Serialize` impl (e.g. non-string map keys).
    #[must_use]
    pub fn new(type_id: u32, body: &impl serde::Serialize) -> Self {
        Self { type_id, payload: serde_json::json!(body) }
    }
}

/// Routes framed requests to registered handlers and writes back replies;
/// forwards notifications to any handler registered for their type id, and
/// interleaves server-initiated notifications onto the same stream.
pub struct Dispatcher {
    handlers: HandlerMap,
}

impl Dispatcher {
    /// Build a dispatcher over a fixed handler table.
    #[must_use]
    pub const fn new(handlers: HandlerMap) -> Self {
        Self { handlers }
    }

    /// Drive one tunnel stream until it closes or `ctx.cancellation` fires.
    ///
    /// Each request is dispatched onto its own task so a slow handler
    /// cannot stall replies to other in-flight requests on the same
    /// stream; a handler panic is caught and turned into a `500 internal`
    /// reply rather than tearing down the stream. Concurrently drains
    /// `notify_rx` and writes each as a `Notify` frame, so background
    /// producers (a terminal session's output fan-out, the sessions
    /// registry's change feed) can push notifications onto this stream
    /// without going through a handler call.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::RpcError`] only if the stream itself fails
    /// in a way that cannot be recovered (the cause is logged before the
    /// loop exits; a malformed individual frame just ends the stream too,
    /// since frame boundaries are unrecoverable once lost).
    pub async fn run<S>(self: Arc<Self>, stream: S, ctx: RpcContext, mut notify_rx: mpsc::Receiver<OutboundNotify>) -> RpcResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut reader, writer) = tokio::io::split(stream);
        let writer = Arc::new(AsyncMutex::new(writer));
        let mut notify_closed = false;

        loop {
            tokio::select! {
                () = ctx.cancellation.cancelled() => break,
                notify = notify_rx.recv(), if !notify_closed => {
                    match notify {
                        Some(notify) => write_notify(&writer, notify.type_id, &notify.payload).await,
                        None => notify_closed = true,
                    }
                }
                frame = redeven_core::read_raw_frame(&mut reader, MAX_FRAME_BYTES) => {
                    let bytes = match frame {
                        Ok(bytes) => bytes,
                        Err(source) => {
                            tracing::debug!(channel_id = %ctx.channel_id, error = %source, "rpc stream closed");
                            break;
                        }
                    };
                    let envelope = match Envelope::decode(&bytes) {
                        Ok(envelope) => envelope,
                        Err(source) => {
                            tracing::warn!(channel_id = %ctx.channel_id, error = %source, "malformed rpc frame, closing stream");
                            break;
                        }
                    };
                    self.dispatch(envelope, &ctx, Arc::clone(&writer));
                }
            }
        }
        Ok(())
    }

    fn dispatch<W>(self: &Arc<Self>, envelope: Envelope, ctx: &RpcContext, writer: Arc<AsyncMutex<W>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        match envelope.kind {
            FrameKind::Request => {
                let dispatcher = Arc::clone(self);
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    dispatcher.handle_request(envelope, ctx, writer).await;
                });
            }
            FrameKind::Notify => {
                let dispatcher = Arc::clone(self);
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    dispatcher.handle_notify(envelope, &ctx).await;
                });
            }
            FrameKind::Reply => {
                tracing::warn!(channel_id = %ctx.channel_id, type_id = envelope.type_id, "ignoring unexpected reply frame from client");
            }
        }
    }

    async fn handle_request<W>(&self, envelope: Envelope, ctx: RpcContext, writer: Arc<AsyncMutex<W>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Some(handler) = self.handlers.get(&envelope.type_id).cloned() else {
            let error = AgentError::NotFound(format!("unknown type id {}", envelope.type_id));
            write_error_reply(&writer, envelope.type_id, envelope.correlation_id, &error).await;
            return;
        };

        let payload: serde_json::Value = match serde_json::from_slice(&envelope.payload) {
            Ok(value) => value,
            Err(source) => {
                let error = AgentError::InvalidRequest(format!("malformed request payload: {source}"));
                write_error_reply(&writer, envelope.type_id, envelope.correlation_id, &error).await;
                return;
            }
        };

        let outcome = AssertUnwindSafe(handler.handle(&ctx, payload)).catch_unwind().await;
        match outcome {
            Ok(Ok(result)) => write_ok_reply(&writer, envelope.type_id, envelope.correlation_id, &result).await,
            Ok(Err(error)) => {
                tracing::warn!(channel_id = %ctx.channel_id, type_id = envelope.type_id, error = %error, "rpc handler error");
                write_error_reply(&writer, envelope.type_id, envelope.correlation_id, &error).await;
            }
            Err(_panic) => {
                let error = AgentError::Internal("handler panicked".to_string());
                tracing::error!(channel_id = %ctx.channel_id, type_id = envelope.type_id, "rpc handler panicked");
                write_error_reply(&writer, envelope.type_id, envelope.correlation_id, &error).await;
            }
        }
    }

    async fn handle_notify(&self, envelope: Envelope, ctx: &RpcContext) {
        let Some(handler) = self.handlers.get(&envelope.type_id).cloned() else {
            tracing::debug!(channel_id = %ctx.channel_id, type_id = envelope.type_id, "dropping notify for unknown type id");
            return;
        };
        let payload: serde_json::Value = match serde_json::from_slice(&envelope.payload) {
            Ok(value) => value,
            Err(source) => {
                tracing::warn!(channel_id = %ctx.channel_id, error = %source, "malformed notify payload, dropping");
                return;
            }
        };
        if let Err(error) = AssertUnwindSafe(handler.handle(ctx, payload)).catch_unwind().await.unwrap_or(Err(AgentError::Internal("handler panicked".to_string())))
        {
            tracing::warn!(channel_id = %ctx.channel_id, type_id = envelope.type_id, error = %error, "notify handler error");
        }
    }
}

async fn write_ok_reply<W>(writer: &AsyncMutex<W>, type_id: u32, correlation_id: u32, result: &serde_json::Value)
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::json!({ "ok": true, "result": result });
    write_reply(writer, type_id, correlation_id, &body).await;
}

async fn write_error_reply<W>(writer: &AsyncMutex<W>, type_id: u32, correlation_id: u32, error: &AgentError)
where
    W: AsyncWrite + Unpin,
{
    let wire_error: WireError = error.into();
    let body = serde_json::json!({ "ok": false, "error": wire_error });
    write_reply(writer, type_id, correlation_id, &body).await;
}

async fn write_reply<W>(writer: &AsyncMutex<W>, type_id: u32, correlation_id: u32, body: &serde_json::Value)
where
    W: AsyncWrite + Unpin,
{
    let Ok(payload) = serde_json::to_vec(body) else {
        tracing::error!(type_id, correlation_id, "failed to serialize rpc reply");
        return;
    };
    let envelope = Envelope::new(FrameKind::Reply, type_id, correlation_id, payload);
    let mut writer = writer.lock().await;
    if let Err(source) = redeven_core::write_raw_frame(&mut *writer, &envelope.encode()).await {
        tracing::debug!(type_id, correlation_id, error = %source, "failed to write rpc reply, stream likely closed");
    }
}

async fn write_notify<W>(writer: &AsyncMutex<W>, type_id: u32, payload: &serde_json::Value)
where
    W: AsyncWrite + Unpin,
{
    let Ok(payload) = serde_json::to_vec(payload) else {
        tracing::error!(type_id, "failed to serialize rpc notify");
        return;
    };
    let envelope = Envelope::new(FrameKind::Notify, type_id, 0, payload);
    let mut writer = writer.lock().await;
    if let Err(source) = redeven_core::write_raw_frame(&mut *writer, &envelope.encode()).await {
        tracing::debug!(type_id, error = %source, "failed to write rpc notify, stream likely closed");
    }
}

#[cfg(test)]
mod tests {
    use redeven_core::ChannelId;
    use redeven_permissions::PermissionSet;
    use tokio::io::duplex;

    use super::*;
    use crate::handler::HandlerMapBuilder;

    struct EchoHandler;

    #[async_trait::async_trait]
    impl crate::handler::RpcHandler for EchoHandler {
        async fn handle(&self, _ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
            Ok(payload)
        }
    }

    struct PanicHandler;

    #[async_trait::async_trait]
    impl crate::handler::RpcHandler for PanicHandler {
        async fn handle(&self, _ctx: &RpcContext, _payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
            panic!("boom");
        }
    }

    async fn read_reply(client: &mut (impl AsyncRead + Unpin)) -> (u32, serde_json::Value) {
        let bytes = redeven_core::read_raw_frame(client, MAX_FRAME_BYTES).await.unwrap();
        let envelope = Envelope::decode(&bytes).unwrap();
        assert_eq!(envelope.kind, FrameKind::Reply);
        let body: serde_json::Value = serde_json::from_slice(&envelope.payload).unwrap();
        (envelope.correlation_id, body)
    }

    #[tokio::test]
    async fn request_to_known_handler_echoes_payload() {
        let handlers = HandlerMapBuilder::new().with(1001, Arc::new(EchoHandler)).build();
        let dispatcher = Arc::new(Dispatcher::new(handlers));
        let ctx = RpcContext::new(ChannelId::from("chan-1"), PermissionSet::all());

        let (mut client, server) = duplex(64 * 1024);
        let request = Envelope::new(FrameKind::Request, 1001, 7, br#"{"hello":"world"}"#.to_vec());
        redeven_core::write_raw_frame(&mut client, &request.encode()).await.unwrap();

        let cancellation = ctx.cancellation.clone();
        let (_notify_tx, notify_rx) = mpsc::channel(1);
        let run_task = tokio::spawn(dispatcher.run(server, ctx, notify_rx));

        let (correlation_id, body) = read_reply(&mut client).await;
        assert_eq!(correlation_id, 7);
        assert_eq!(body["ok"], serde_json::json!(true));
        assert_eq!(body["result"]["hello"], serde_json::json!("world"));

        cancellation.cancel();
        run_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn request_to_unknown_type_id_is_not_found() {
        let dispatcher = Arc::new(Dispatcher::new(HandlerMapBuilder::new().build()));
        let ctx = RpcContext::new(ChannelId::from("chan-2"), PermissionSet::all());

        let (mut client, server) = duplex(64 * 1024);
        let request = Envelope::new(FrameKind::Request, 9999, 1, b"{}".to_vec());
        redeven_core::write_raw_frame(&mut client, &request.encode()).await.unwrap();

        let cancellation = ctx.cancellation.clone();
        let (_notify_tx, notify_rx) = mpsc::channel(1);
        let run_task = tokio::spawn(dispatcher.run(server, ctx, notify_rx));

        let (_, body) = read_reply(&mut client).await;
        assert_eq!(body["ok"], serde_json::json!(false));
        assert_eq!(body["error"]["code"], serde_json::json!(404));

        cancellation.cancel();
        run_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn handler_panic_becomes_internal_error_reply() {
        let handlers = HandlerMapBuilder::new().with(1, Arc::new(PanicHandler)).build();
        let dispatcher = Arc::new(Dispatcher::new(handlers));
        let ctx = RpcContext::new(ChannelId::from("chan-3"), PermissionSet::all());

        let (mut client, server) = duplex(64 * 1024);
        let request = Envelope::new(FrameKind::Request, 1, 3, b"{}".to_vec());
        redeven_core::write_raw_frame(&mut client, &request.encode()).await.unwrap();

        let cancellation = ctx.cancellation.clone();
        let (_notify_tx, notify_rx) = mpsc::channel(1);
        let run_task = tokio::spawn(dispatcher.run(server, ctx, notify_rx));

        let (_, body) = read_reply(&mut client).await;
        assert_eq!(body["ok"], serde_json::json!(false));
        assert_eq!(body["error"]["code"], serde_json::json!(500));

        cancellation.cancel();
        run_task.await.unwrap().unwrap();
    }
}
