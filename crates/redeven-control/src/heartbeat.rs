//! Periodic heartbeat ticker for one control connection.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::protocol::{ControlMessage, build_heartbeat};

/// Heartbeat interval.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Tick a `heartbeat` request onto `outbound_tx` every [`HEARTBEAT_INTERVAL`]
/// until the token is cancelled or the channel closes.
///
/// There is no ACK tracking here: the control channel relies on the
/// transport's own keepalive, and a failed send (the outbound channel
/// closed because the writer task exited) is itself the signal that the
/// connection is gone — the caller's read loop will observe the same
/// failure and trigger reconnect.
pub(crate) async fn run_heartbeat(outbound_tx: mpsc::Sender<ControlMessage>, cancellation: CancellationToken) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await; // first tick fires immediately; skip it
    let mut correlation_id: u32 = 1;

    loop {
        tokio::select! {
            () = cancellation.cancelled() => return,
            _ = ticker.tick() => {
                let now_unix_ms = crate::client::now_unix_ms();
                debug!(now_unix_ms, "sending heartbeat");
                let message = build_heartbeat(correlation_id, now_unix_ms);
                correlation_id = correlation_id.wrapping_add(1);
                if outbound_tx.send(message).await.is_err() {
                    return;
                }
            }
        }
    }
}
