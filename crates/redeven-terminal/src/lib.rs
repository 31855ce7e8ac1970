//! Terminal session manager for the redeven agent.
//!
//! Owns every PTY session: spawn, list, multi-client attach/detach,
//! sequenced output fan-out with a bounded history ring, and best-effort
//! working-directory tracking. A slow attached client is detached rather
//! than allowed to stall the PTY reader.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod history;
mod ids;
mod manager;
mod pty;
mod session;

pub use error::{TerminalError, TerminalResult};
pub use history::HistoryChunk;
pub use ids::{ConnId, TerminalSessionId};
pub use manager::{TerminalManager, TerminalManagerConfig};
pub use session::{SessionsChangedEvent, SessionsChangedReason, TerminalEvent, TerminalSessionSnapshot, TerminalStats};
