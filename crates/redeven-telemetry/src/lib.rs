//! Logging and request-correlation telemetry for the redeven agent.
//!
//! This crate provides:
//! - Configurable logging setup with multiple output formats and targets
//! - A [`RequestContext`] for correlating log lines across an RPC call or
//!   control-channel event
//! - Integration with the `tracing` ecosystem
//!
//! # Example
//!
//! ```rust,no_run
//! use redeven_telemetry::{LogConfig, LogFormat, setup_logging, RequestContext};
//!
//! # fn main() -> Result<(), redeven_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug").with_format(LogFormat::Pretty);
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("rpc").with_operation("fs/read_file");
//! let _guard = ctx.enter();
//! tracing::info!("dispatching request");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::{RequestContext, RequestGuard};
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
