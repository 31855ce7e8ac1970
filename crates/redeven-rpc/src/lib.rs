//! The framed request/reply/notify RPC dispatcher shared by every tunnel
//! RPC stream.
//!
//! Wire shape: a `u32` big-endian length prefix (shared with every other
//! tunnel stream via [`redeven_core::frame`]), then `kind (1 byte) |
//! type_id (u32) | correlation_id (u32, 0 for notify) | payload_json`.
//! Handlers are registered per type id in a [`HandlerMap`]; unknown type
//! ids reply `404`, handler panics reply `500` rather than tearing down
//! the stream.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod context;
mod dispatcher;
mod envelope;
mod error;
mod handler;

pub use context::RpcContext;
pub use dispatcher::{Dispatcher, OutboundNotify};
pub use envelope::{Envelope, FrameKind};
pub use error::{RpcError, RpcResult};
pub use handler::{HandlerMap, HandlerMapBuilder, RpcHandler};
