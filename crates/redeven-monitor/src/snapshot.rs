use serde::{Deserialize, Serialize};

/// Which dimension to sort and truncate the process list by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Sort by CPU usage, descending.
    Cpu,
    /// Sort by resident memory, descending.
    Memory,
}

/// One process entry in a [`MonitorSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// OS process id.
    pub pid: u32,
    /// Process executable name.
    pub name: String,
    /// Owning user, if it could be resolved.
    pub user: Option<String>,
    /// CPU usage as a percentage (may exceed 100 on multi-core systems).
    pub cpu_percent: f32,
    /// Resident memory, in bytes.
    pub memory_bytes: u64,
}

/// Network throughput computed over the sliding sample window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NetworkSpeed {
    /// Bytes received per second, averaged across the window.
    pub rx_bytes_per_sec: f64,
    /// Bytes transmitted per second, averaged across the window.
    pub tx_bytes_per_sec: f64,
}

/// A point-in-time host snapshot: the `monitor()` RPC reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// When this snapshot was sampled (not necessarily "now" — may be served from cache).
    pub timestamp_ms: i64,
    /// Total CPU usage across all cores, as a percentage.
    pub cpu_percent_total: f32,
    /// Number of logical CPU cores.
    pub cpu_core_count: usize,
    /// Used physical memory, in bytes.
    pub memory_used_bytes: u64,
    /// Total physical memory, in bytes.
    pub memory_total_bytes: u64,
    /// Cumulative bytes received across all interfaces since boot.
    pub bytes_received: u64,
    /// Cumulative bytes transmitted across all interfaces since boot.
    pub bytes_transmitted: u64,
    /// Network throughput over the sliding window.
    pub network: NetworkSpeed,
    /// The top 20 processes by the requested [`SortBy`] dimension, descending.
    pub processes: Vec<ProcessInfo>,
    /// Operating system name and version, e.g. `"Linux 6.8.0"`.
    pub platform: String,
}
