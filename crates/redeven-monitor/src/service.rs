use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use redeven_permissions::PermissionSet;
use sysinfo::{Networks, ProcessesToUpdate, System, Users};

use crate::error::{MonitorError, MonitorResult};
use crate::snapshot::{MonitorSnapshot, NetworkSpeed, ProcessInfo, SortBy};

const CACHE_TTL: Duration = Duration::from_secs(2);
const NET_WINDOW: Duration = Duration::from_secs(6);
const TOP_N: usize = 20;
const CPU_WARMUP_DELAY: Duration = Duration::from_millis(250);

struct NetSample {
    at: Instant,
    rx_bytes: u64,
    tx_bytes: u64,
}

struct RawSample {
    timestamp_ms: i64,
    cpu_percent_total: f32,
    cpu_core_count: usize,
    memory_used_bytes: u64,
    memory_total_bytes: u64,
    bytes_received: u64,
    bytes_transmitted: u64,
    network: NetworkSpeed,
    processes: Vec<ProcessInfo>,
    platform: String,
}

struct MonitorState {
    sys: System,
    networks: Networks,
    users: Users,
    last_cpu_refresh: Option<Instant>,
    net_window: VecDeque<NetSample>,
    cached: Option<(Instant, RawSample)>,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            sys: System::new_all(),
            networks: Networks::new_with_refreshed_list(),
            users: Users::new_with_refreshed_list(),
            last_cpu_refresh: None,
            net_window: VecDeque::new(),
            cached: None,
        }
    }

    fn sample_if_stale(&mut self) -> RawSample {
        if let Some((taken_at, raw)) = &self.cached {
            if taken_at.elapsed() < CACHE_TTL {
                return clone_raw(raw);
            }
        }
        let raw = self.sample_now();
        self.cached = Some((Instant::now(), clone_raw(&raw)));
        raw
    }

    fn sample_now(&mut self) -> RawSample {
        let now = Instant::now();
        let needs_warmup = self.last_cpu_refresh.is_none();
        self.sys.refresh_cpu_usage();
        if needs_warmup {
            std::thread::sleep(CPU_WARMUP_DELAY);
            self.sys.refresh_cpu_usage();
        }
        self.last_cpu_refresh = Some(Instant::now());
        let cpu_percent_total = self.sys.global_cpu_usage();

        self.sys.refresh_memory();
        let memory_used_bytes = self.sys.used_memory();
        let memory_total_bytes = self.sys.total_memory();

        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        self.users.refresh();
        let processes = self
            .sys
            .processes()
            .iter()
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                user: process.user_id().and_then(|uid| self.users.get_user_by_id(uid)).map(|user| user.name().to_string()),
                cpu_percent: process.cpu_usage(),
                memory_bytes: process.memory(),
            })
            .collect();

        self.networks.refresh(true);
        let (total_rx, total_tx) = self.networks.iter().fold((0_u64, 0_u64), |(rx, tx), (_iface, data)| {
            (rx.saturating_add(data.total_received()), tx.saturating_add(data.total_transmitted()))
        });
        self.net_window.push_back(NetSample { at: now, rx_bytes: total_rx, tx_bytes: total_tx });
        while self.net_window.front().is_some_and(|oldest| now.duration_since(oldest.at) > NET_WINDOW) {
            self.net_window.pop_front();
        }
        let network = network_speed(&self.net_window);
        let cpu_core_count = self.sys.cpus().len();
        let platform = platform_string();

        RawSample {
            timestamp_ms: now_unix_ms(),
            cpu_percent_total,
            cpu_core_count,
            memory_used_bytes,
            memory_total_bytes,
            bytes_received: total_rx,
            bytes_transmitted: total_tx,
            network,
            processes,
            platform,
        }
    }
}

fn platform_string() -> String {
    let name = System::name().unwrap_or_else(|| "unknown".to_string());
    match System::long_os_version() {
        Some(version) => format!("{name} {version}"),
        None => name,
    }
}

fn clone_raw(raw: &RawSample) -> RawSample {
    RawSample {
        timestamp_ms: raw.timestamp_ms,
        cpu_percent_total: raw.cpu_percent_total,
        cpu_core_count: raw.cpu_core_count,
        memory_used_bytes: raw.memory_used_bytes,
        memory_total_bytes: raw.memory_total_bytes,
        bytes_received: raw.bytes_received,
        bytes_transmitted: raw.bytes_transmitted,
        network: raw.network,
        processes: raw.processes.clone(),
        platform: raw.platform.clone(),
    }
}

fn network_speed(window: &VecDeque<NetSample>) -> NetworkSpeed {
    let (Some(oldest), Some(latest)) = (window.front(), window.back()) else {
        return NetworkSpeed { rx_bytes_per_sec: 0.0, tx_bytes_per_sec: 0.0 };
    };
    let elapsed = latest.at.duration_since(oldest.at).as_secs_f64();
    if elapsed <= 0.0 {
        return NetworkSpeed { rx_bytes_per_sec: 0.0, tx_bytes_per_sec: 0.0 };
    }
    NetworkSpeed {
        rx_bytes_per_sec: (latest.rx_bytes.saturating_sub(oldest.rx_bytes)) as f64 / elapsed,
        tx_bytes_per_sec: (latest.tx_bytes.saturating_sub(oldest.tx_bytes)) as f64 / elapsed,
    }
}

fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn build_snapshot(raw: RawSample, sort_by: SortBy) -> MonitorSnapshot {
    let mut processes = raw.processes;
    match sort_by {
        SortBy::Cpu => processes.sort_by(|a, b| b.cpu_percent.total_cmp(&a.cpu_percent)),
        SortBy::Memory => processes.sort_by(|a, b| b.memory_bytes.cmp(&a.memory_bytes)),
    }
    processes.truncate(TOP_N);

    MonitorSnapshot {
        timestamp_ms: raw.timestamp_ms,
        cpu_percent_total: raw.cpu_percent_total,
        cpu_core_count: raw.cpu_core_count,
        memory_used_bytes: raw.memory_used_bytes,
        memory_total_bytes: raw.memory_total_bytes,
        bytes_received: raw.bytes_received,
        bytes_transmitted: raw.bytes_transmitted,
        network: raw.network,
        processes,
        platform: raw.platform,
    }
}

/// Host introspection service backing the `monitor` RPC.
///
/// Samples are cached for 2 s; a request inside that window is served from
/// cache regardless of `sort_by`, since sorting the cached process list is
/// cheap and sampling the host is not.
pub struct MonitorService {
    state: Arc<StdMutex<MonitorState>>,
}

impl Default for MonitorService {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorService {
    /// Build a service with an empty cache. The first call to
    /// [`Self::snapshot`] always samples fresh.
    #[must_use]
    pub fn new() -> Self {
        Self { state: Arc::new(StdMutex::new(MonitorState::new())) }
    }

    /// Return the current host snapshot, sorted and truncated to the top
    /// 20 processes by `sort_by`. Requires `execute` (treated as a
    /// privileged introspection capability since it leaks process names
    /// and owning users).
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::PermissionDenied`] without `execute`, or
    /// [`MonitorError::Unavailable`] if the sampling task panics.
    pub async fn snapshot(&self, permissions: PermissionSet, sort_by: SortBy) -> MonitorResult<MonitorSnapshot> {
        if !permissions.execute {
            return Err(MonitorError::PermissionDenied("execute permission required to read the monitor snapshot".to_string()));
        }

        let state = Arc::clone(&self.state);
        let raw = tokio::task::spawn_blocking(move || {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            guard.sample_if_stale()
        })
        .await
        .map_err(|source| MonitorError::Unavailable(format!("sampling task failed: {source}")))?;

        Ok(build_snapshot(raw, sort_by))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_requires_execute_permission() {
        let service = MonitorService::new();
        let permissions = PermissionSet { read: true, write: true, execute: false };
        let result = service.snapshot(permissions, SortBy::Cpu).await;
        assert!(matches!(result, Err(MonitorError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn snapshot_truncates_to_top_20() {
        let service = MonitorService::new();
        let snapshot = service.snapshot(PermissionSet::all(), SortBy::Memory).await.expect("snapshot succeeds");
        assert!(snapshot.processes.len() <= TOP_N);
        assert!(snapshot.memory_total_bytes > 0);
    }

    #[tokio::test]
    async fn cpu_sort_is_descending() {
        let service = MonitorService::new();
        let snapshot = service.snapshot(PermissionSet::all(), SortBy::Cpu).await.expect("snapshot succeeds");
        for pair in snapshot.processes.windows(2) {
            assert!(pair[0].cpu_percent >= pair[1].cpu_percent);
        }
    }

    #[test]
    fn network_speed_with_one_sample_is_zero() {
        let mut window = VecDeque::new();
        window.push_back(NetSample { at: Instant::now(), rx_bytes: 100, tx_bytes: 50 });
        let speed = network_speed(&window);
        assert_eq!(speed.rx_bytes_per_sec, 0.0);
    }
}
