//! Outer connect/register/heartbeat/reconnect loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::connection::{self, ControlConnection, ControlWriter};
use crate::error::{ControlError, ControlResult};
use crate::heartbeat::run_heartbeat;
use crate::protocol::{ControlMessage, FrameKind, GrantDelivery, OkReply, RegisterRequest, build_register, type_id};

/// How long to wait for a reply to `register` before giving up.
const REGISTER_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity fields sent in every `register` request.
#[derive(Debug, Clone)]
pub struct ControlClientConfig {
    /// The coordinator's direct `WebSocket` endpoint (`direct.ws_url` from
    /// the agent config).
    pub coordinator_url: String,
    /// Public id of the environment this agent belongs to.
    pub env_public_id: String,
    /// Stable per-install id, generated at bootstrap.
    pub agent_instance_id: String,
    /// Agent build version.
    pub version: String,
    /// Host name, for operator-facing diagnostics.
    pub hostname: String,
}

/// Maintains one connection to the coordinator, re-registering and
/// resuming heartbeats after every reconnect.
pub struct ControlClient {
    config: ControlClientConfig,
}

impl ControlClient {
    /// Build a client. Does not connect yet.
    #[must_use]
    pub const fn new(config: ControlClientConfig) -> Self {
        Self { config }
    }

    /// Run until `cancellation` fires.
    ///
    /// Reconnects with [`Backoff::for_control_channel`] on every failure;
    /// a `register` rejection, a lost socket, or a malformed message are
    /// all treated the same way — log, back off, retry. Only cancellation
    /// ends the loop for good.
    ///
    /// # Errors
    ///
    /// Never returns `Err` in practice: every recoverable failure is
    /// retried internally. The `Result` exists so a future unrecoverable
    /// failure mode has somewhere to surface without changing the
    /// signature.
    pub async fn run(&self, grant_tx: mpsc::Sender<GrantDelivery>, cancellation: CancellationToken) -> ControlResult<()> {
        let mut backoff = Backoff::for_control_channel();

        loop {
            if cancellation.is_cancelled() {
                return Ok(());
            }

            match self.connect_and_run(&grant_tx, &cancellation).await {
                Ok(()) => return Ok(()),
                Err(ControlError::Shutdown) => return Ok(()),
                Err(err) => {
                    warn!(error = %err, "control channel error, reconnecting");
                    let delay = backoff.next_delay();
                    info!(delay_ms = delay.as_millis(), "backing off before reconnect");
                    tokio::select! {
                        () = cancellation.cancelled() => return Ok(()),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One connection attempt: connect, register, run heartbeat + read loop.
    async fn connect_and_run(&self, grant_tx: &mpsc::Sender<GrantDelivery>, cancellation: &CancellationToken) -> ControlResult<()> {
        info!(url = %self.config.coordinator_url, "connecting to coordinator");
        let conn = ControlConnection::connect(&self.config.coordinator_url).await?;
        let (writer, mut reader) = conn.into_parts();

        let (outbound_tx, outbound_rx) = mpsc::channel::<ControlMessage>(64);
        let writer_handle = spawn_writer(writer, outbound_rx);

        let register_body = RegisterRequest {
            env_public_id: self.config.env_public_id.clone(),
            agent_instance_id: self.config.agent_instance_id.clone(),
            version: self.config.version.clone(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            hostname: self.config.hostname.clone(),
        };
        outbound_tx
            .send(build_register(0, &register_body))
            .await
            .map_err(|_| ControlError::Protocol("writer task closed before register".to_string()))?;

        Self::wait_for_register_ack(&mut reader).await?;
        info!("registered with coordinator");

        let heartbeat_cancel = CancellationToken::new();
        let heartbeat_handle = tokio::spawn(run_heartbeat(outbound_tx.clone(), heartbeat_cancel.clone()));

        let result = event_loop(&mut reader, grant_tx, cancellation).await;

        heartbeat_cancel.cancel();
        let _ = heartbeat_handle.await;
        drop(outbound_tx);
        tokio::select! {
            _ = writer_handle => {},
            () = tokio::time::sleep(Duration::from_secs(2)) => {},
        }

        result
    }

    /// Read directly from `reader` until the `register` reply arrives.
    async fn wait_for_register_ack(reader: &mut connection::ControlReader) -> ControlResult<()> {
        let fut = async {
            loop {
                match connection::recv(reader).await? {
                    Some(ControlMessage { kind: FrameKind::Reply, type_id: tid, payload, .. }) if tid == type_id::REGISTER => {
                        let reply: OkReply = serde_json::from_value(payload)?;
                        return if reply.ok {
                            Ok(())
                        } else {
                            Err(ControlError::RegisterFailed("coordinator replied ok=false".to_string()))
                        };
                    }
                    Some(_) => continue,
                    None => return Err(ControlError::Protocol("connection closed before register reply".to_string())),
                }
            }
        };

        tokio::time::timeout(REGISTER_TIMEOUT, fut).await.map_err(|_| ControlError::RegisterTimeout)?
    }
}

async fn event_loop(reader: &mut connection::ControlReader, grant_tx: &mpsc::Sender<GrantDelivery>, cancellation: &CancellationToken) -> ControlResult<()> {
    loop {
        tokio::select! {
            biased;
            () = cancellation.cancelled() => return Err(ControlError::Shutdown),
            message = connection::recv(reader) => {
                match message? {
                    Some(message) => handle_message(message, grant_tx).await,
                    None => return Err(ControlError::Protocol("connection closed".to_string())),
                }
            }
        }
    }
}

async fn handle_message(message: ControlMessage, grant_tx: &mpsc::Sender<GrantDelivery>) {
    match (message.kind, message.type_id) {
        (FrameKind::Notify, tid) if tid == type_id::GRANT_SERVER => match serde_json::from_value::<GrantDelivery>(message.payload) {
            Ok(delivery) => {
                if grant_tx.send(delivery).await.is_err() {
                    warn!("grant delivery channel closed, dropping grant");
                }
            }
            Err(source) => warn!(error = %source, "malformed grant_server notify, dropping"),
        },
        (FrameKind::Reply, tid) if tid == type_id::HEARTBEAT => {
            debug!("heartbeat acknowledged");
        }
        (kind, other_type_id) => {
            debug!(?kind, type_id = other_type_id, "ignoring unrecognized control message");
        }
    }
}

fn spawn_writer(mut writer: ControlWriter, mut outbound_rx: mpsc::Receiver<ControlMessage>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if let Err(source) = connection::send(&mut writer, &message).await {
                debug!(error = %source, "control writer: send failed");
                break;
            }
        }
        let _ = futures::SinkExt::<Message>::close(&mut writer).await;
    })
}

/// Current time in milliseconds since the Unix epoch, for `heartbeat`
/// bodies and startup logging.
pub(crate) fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use redeven_core::FloeApp;

    use super::*;
    use crate::protocol::{GrantServer, GrantSessionMeta};

    fn sample_delivery() -> GrantDelivery {
        GrantDelivery {
            grant_server: GrantServer { channel_id: "chan-1".to_string(), tunnel_url: "wss://tunnel.example/chan-1".to_string() },
            session_meta: GrantSessionMeta {
                channel_id: "chan-1".to_string(),
                endpoint_id: "env-1".to_string(),
                floe_app: FloeApp::Terminal,
                code_space_id: None,
                user_public_id: "user-1".to_string(),
                user_email: "user@example.com".to_string(),
                can_read_files: true,
                can_write_files: false,
                can_execute: true,
            },
        }
    }

    #[tokio::test]
    async fn grant_server_notify_is_forwarded() {
        let (grant_tx, mut grant_rx) = mpsc::channel(1);
        let delivery = sample_delivery();
        let message = ControlMessage { kind: FrameKind::Notify, type_id: type_id::GRANT_SERVER, correlation_id: 0, payload: serde_json::json!(delivery) };

        handle_message(message, &grant_tx).await;

        let forwarded = grant_rx.try_recv().unwrap();
        assert_eq!(forwarded.grant_server.channel_id, "chan-1");
    }

    #[tokio::test]
    async fn malformed_grant_notify_is_dropped_not_panicking() {
        let (grant_tx, mut grant_rx) = mpsc::channel(1);
        let message = ControlMessage { kind: FrameKind::Notify, type_id: type_id::GRANT_SERVER, correlation_id: 0, payload: serde_json::json!({"nonsense": true}) };

        handle_message(message, &grant_tx).await;

        assert!(grant_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unrecognized_message_is_ignored() {
        let (grant_tx, mut grant_rx) = mpsc::channel(1);
        let message = ControlMessage { kind: FrameKind::Request, type_id: 99_999, correlation_id: 0, payload: serde_json::json!({}) };

        handle_message(message, &grant_tx).await;

        assert!(grant_rx.try_recv().is_err());
    }

    #[test]
    fn now_unix_ms_is_positive() {
        assert!(now_unix_ms() > 0);
    }
}
