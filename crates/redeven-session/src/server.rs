//! Connects to one tunnel, demultiplexes its sub-streams, and dispatches
//! each to the handler matching its hello frame.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use redeven_core::ChannelId;
use redeven_permissions::PermissionSet;
use redeven_rpc::{Dispatcher, RpcContext};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use crate::error::{CloseReason, SessionError, SessionResult};
use crate::handlers::{self, SharedServices};
use crate::multiplex::{self, AcceptedStream, MultiplexFrame, STREAM_BUFFER_BYTES, StreamKind, StreamRoute};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const OUTBOUND_PUMP_CHUNK_BYTES: usize = STREAM_BUFFER_BYTES;

/// Everything one tunnel session needs to run.
pub struct SessionParams {
    /// The tunnel `WebSocket` endpoint granted for this session.
    pub tunnel_url: String,
    /// The session's channel id, used as every `rpc` sub-stream's
    /// [`redeven_core::ChannelId`] and as the terminal `conn_id` shared by
    /// every attach on this tunnel.
    pub channel_id: ChannelId,
    /// The session's effective, already-clamped permission set.
    pub permissions: PermissionSet,
    /// The agent-wide services this session's handlers dispatch into.
    pub services: SharedServices,
    /// Cancelled by the owning registry entry when the session should end.
    pub cancellation: CancellationToken,
    /// Fired once the tunnel `WebSocket` connects, so the caller can mark
    /// the registry entry connected. `None` if the caller does not need
    /// to observe this.
    pub connected_tx: Option<oneshot::Sender<()>>,
}

/// Connect to `params.tunnel_url` and run until the tunnel closes or
/// `params.cancellation` fires.
///
/// Does not touch the session registry: the caller removes the registry
/// entry once this returns, regardless of [`CloseReason`].
pub async fn run_session(params: SessionParams) -> CloseReason {
    let started_at = Instant::now();
    let reason = match run(params).await {
        Ok(reason) => reason,
        Err(error) => {
            tracing::warn!(error = %error, "tunnel session ended with an error");
            error.close_reason()
        }
    };
    tracing::info!(reason = reason.as_str(), duration_ms = started_at.elapsed().as_millis(), "tunnel session ended");
    reason
}

async fn run(params: SessionParams) -> SessionResult<CloseReason> {
    let SessionParams { tunnel_url, channel_id, permissions, services, cancellation, connected_tx } = params;

    tracing::info!(channel_id = %channel_id, "connecting to tunnel");
    let ws = connect_async(&tunnel_url).await.map_err(|source| SessionError::ConnectFailed(Box::new(source)))?;
    if let Some(tx) = connected_tx {
        let _ = tx.send(());
    }
    let (ws_writer, mut ws_reader) = ws.0.split();

    let (outbound_tx, outbound_rx) = mpsc::channel::<Message>(64);
    let writer_handle = tokio::spawn(run_writer(ws_writer, outbound_rx));

    let mut streams: HashMap<u32, StreamRoute> = HashMap::new();
    let mut stream_tasks = Vec::new();

    let close_reason = loop {
        tokio::select! {
            () = cancellation.cancelled() => break CloseReason::Canceled,
            message = ws_reader.next() => {
                match message {
                    Some(Ok(Message::Binary(bytes))) => {
                        if let Err(source) = handle_multiplex_message(
                            &bytes,
                            &mut streams,
                            &mut stream_tasks,
                            &channel_id,
                            permissions,
                            &services,
                            &outbound_tx,
                            &cancellation,
                        ).await {
                            tracing::warn!(channel_id = %channel_id, error = %source, "dropping malformed multiplex frame");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break CloseReason::Eof,
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Text(_) | Message::Frame(_))) => {}
                    Some(Err(source)) => {
                        tracing::warn!(channel_id = %channel_id, error = %source, "tunnel read error");
                        break CloseReason::Error;
                    }
                }
            }
        }
    };

    drop(outbound_tx);
    drop(streams);
    for task in stream_tasks {
        task.abort();
    }
    let _ = tokio::time::timeout(std::time::Duration::from_secs(2), writer_handle).await;

    Ok(close_reason)
}

#[allow(clippy::too_many_arguments)]
async fn handle_multiplex_message(
    bytes: &[u8],
    streams: &mut HashMap<u32, StreamRoute>,
    stream_tasks: &mut Vec<tokio::task::JoinHandle<()>>,
    channel_id: &ChannelId,
    permissions: PermissionSet,
    services: &SharedServices,
    outbound_tx: &mpsc::Sender<Message>,
    cancellation: &CancellationToken,
) -> SessionResult<()> {
    let frame = MultiplexFrame::decode(bytes)?;

    if let Some(route) = streams.get(&frame.stream_id) {
        if route.inbound_tx.send((frame.payload, frame.fin)).await.is_err() || frame.fin {
            streams.remove(&frame.stream_id);
        }
        return Ok(());
    }

    let Some(kind) = StreamKind::from_hello(&frame.payload) else {
        tracing::warn!(channel_id = %channel_id, stream_id = frame.stream_id, "unrecognized hello kind, closing sub-stream");
        let _ = outbound_tx.send(Message::Binary(MultiplexFrame { stream_id: frame.stream_id, fin: true, payload: Vec::new() }.encode().into())).await;
        return Ok(());
    };

    let (accepted, route, inbound_rx, tunnel_side) = multiplex::new_stream(frame.stream_id, kind);
    let stream_cancellation = cancellation.child_token();
    let (tunnel_read, tunnel_write) = tokio::io::split(tunnel_side);

    stream_tasks.push(tokio::spawn(run_inbound_pump(tunnel_write, inbound_rx)));
    stream_tasks.push(tokio::spawn(run_outbound_pump(tunnel_read, frame.stream_id, outbound_tx.clone())));
    stream_tasks.push(tokio::spawn(run_accepted_stream(accepted, channel_id.clone(), permissions, services.clone(), stream_cancellation)));

    streams.insert(frame.stream_id, route);
    Ok(())
}

async fn run_writer(mut writer: futures::stream::SplitSink<WsStream, Message>, mut outbound_rx: mpsc::Receiver<Message>) {
    while let Some(message) = outbound_rx.recv().await {
        if let Err(source) = writer.send(message).await {
            tracing::debug!(error = %source, "tunnel writer: send failed");
            break;
        }
    }
    let _ = writer.close().await;
}

async fn run_inbound_pump(mut write_half: WriteHalf<tokio::io::DuplexStream>, mut inbound_rx: mpsc::Receiver<(Vec<u8>, bool)>) {
    while let Some((bytes, fin)) = inbound_rx.recv().await {
        if !bytes.is_empty() && write_half.write_all(&bytes).await.is_err() {
            break;
        }
        if fin {
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

async fn run_outbound_pump(mut read_half: ReadHalf<tokio::io::DuplexStream>, stream_id: u32, outbound_tx: mpsc::Sender<Message>) {
    let mut buf = vec![0_u8; OUTBOUND_PUMP_CHUNK_BYTES];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) | Err(_) => {
                let _ = outbound_tx.send(Message::Binary(MultiplexFrame { stream_id, fin: true, payload: Vec::new() }.encode().into())).await;
                break;
            }
            Ok(n) => {
                let frame = MultiplexFrame { stream_id, fin: false, payload: buf[..n].to_vec() };
                if outbound_tx.send(Message::Binary(frame.encode().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn run_accepted_stream(accepted: AcceptedStream, channel_id: ChannelId, permissions: PermissionSet, services: SharedServices, cancellation: CancellationToken) {
    match accepted.kind {
        StreamKind::Rpc => {
            let ctx = RpcContext { channel_id, permissions, cancellation: cancellation.clone() };
            let (notify_tx, notify_rx) = mpsc::channel(64);
            let handlers = handlers::build_handler_map(&services, notify_tx.clone());
            tokio::spawn(handlers::forward_sessions_changed(Arc::clone(&services.terminal), notify_tx, cancellation));
            let dispatcher = Arc::new(Dispatcher::new(handlers));
            if let Err(source) = dispatcher.run(accepted.io, ctx, notify_rx).await {
                tracing::debug!(stream_id = accepted.stream_id, error = %source, "rpc sub-stream ended");
            }
        }
        StreamKind::FsReadFile => {
            if let Err(source) = redeven_vfs::serve_read_file_stream(accepted.io, &services.fs, &permissions, &cancellation).await {
                tracing::debug!(stream_id = accepted.stream_id, error = %source, "fs/read_file sub-stream ended");
            }
        }
    }
}
