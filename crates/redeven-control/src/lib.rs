//! Control-channel client: a persistent `WebSocket` connection to the
//! coordinator that registers the agent, heartbeats every 10 s, and
//! forwards `grant_server` deliveries to the supervisor.
//!
//! Disconnects of any cause trigger [`Backoff::for_control_channel`]
//! reconnection; only cancellation of the caller's [`tokio_util::sync::CancellationToken`]
//! ends the loop for good.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod backoff;
mod client;
mod connection;
mod error;
mod heartbeat;
pub mod protocol;

pub use backoff::Backoff;
pub use client::{ControlClient, ControlClientConfig};
pub use error::{ControlError, ControlResult};
