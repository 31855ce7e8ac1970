//! Host introspection for the redeven agent.
//!
//! A single cached snapshot covering total CPU, memory, network throughput
//! over a sliding window, and the top processes by CPU or memory. Sampling
//! the host is comparatively expensive, so snapshots are cached for 2 s;
//! repeated calls within that window are served from cache.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod service;
mod snapshot;

pub use error::{MonitorError, MonitorResult};
pub use service::MonitorService;
pub use snapshot::{MonitorSnapshot, NetworkSpeed, ProcessInfo, SortBy};
