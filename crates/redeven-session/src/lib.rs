//! Data-session server for the redeven agent.
//!
//! A grant hands the agent one tunnel `WebSocket` URL and a permission set;
//! this crate connects, demultiplexes the tunnel's sub-streams by their
//! hello frame (`rpc` or `fs/read_file`), and dispatches each to the
//! matching handler. One sub-stream is reused for every RPC call the
//! client makes over the life of the tunnel; `fs/read_file` streams are
//! one-shot and closed once their transfer completes.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod handlers;
mod multiplex;
mod server;
mod type_id;

pub use error::{CloseReason, SessionError, SessionResult};
pub use handlers::SharedServices;
pub use server::{SessionParams, run_session};
