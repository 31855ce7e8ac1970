//! The live tunnel-session registry: `channel_id -> ActiveSession`, and the
//! `sessions/list_active` listing it serves.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod registry;
mod summary;

pub use registry::SessionRegistry;
pub use summary::ActiveSessionSummary;
