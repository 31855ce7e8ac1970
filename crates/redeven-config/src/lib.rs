//! On-disk JSON config for the redeven agent: parse, validate, atomic save.
//!
//! Read path: parse JSON, validate. Write path: marshal to a temp file in
//! the config directory with mode `0600`, fsync, rename over the target —
//! the config file is written only by bootstrap and read-only at runtime.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod io;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use io::{default_config_path, load, save};
pub use types::{Config, DirectParams, LogFormat, LogLevel};
