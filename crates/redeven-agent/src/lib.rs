//! Top-level agent supervisor and process lock.
//!
//! Startup order: acquire the process lock, load and validate the config,
//! construct the filesystem/terminal/monitor services and session
//! registry, start the control-channel client, then run until a shutdown
//! signal arrives. Shutdown cancels the control channel and every live
//! data session via the registry, then releases the lock.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod acceptance;
mod error;
mod lock;
mod paths;
mod supervisor;

pub use error::{SupervisorError, SupervisorResult};
pub use lock::ProcessLock;
pub use paths::AgentPaths;
pub use supervisor::run;
