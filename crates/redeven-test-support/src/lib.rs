//! Shared test fixtures for redeven crates.
//!
//! Add as a `[dev-dependencies]` entry and pull in what a test needs:
//!
//! ```toml
//! [dev-dependencies]
//! redeven-test-support.workspace = true
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod grants;

pub use config::{TempConfigDir, test_config};
pub use grants::{foreign_grant_delivery, test_grant_delivery};
