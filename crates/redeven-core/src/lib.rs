//! Shared ids, session metadata, and the error taxonomy shared by every
//! `redeven` agent crate.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod frame;
mod ids;
mod session;

pub use error::{AgentError, ErrorCode, WireError};
pub use frame::{FrameError, read_json_frame, read_raw_frame, write_json_frame, write_raw_frame};
pub use ids::ChannelId;
pub use session::{ActiveSession, FloeApp, SessionMeta};
