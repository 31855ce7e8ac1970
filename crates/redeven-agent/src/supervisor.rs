//! Startup order: acquire process lock -> load config -> construct
//! services -> start the control-channel client -> block on signal.
//!
//! Graceful shutdown (SIGINT or SIGTERM) cancels the control channel and
//! every live data session via the registry, kills every PTY child via
//! the terminal manager, then awaits both before returning.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use redeven_control::{ControlClient, ControlClientConfig};
use redeven_monitor::MonitorService;
use redeven_registry::SessionRegistry;
use redeven_session::SharedServices;
use redeven_terminal::{TerminalManager, TerminalManagerConfig};
use redeven_vfs::FsService;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::acceptance::accept_grant;
use crate::error::SupervisorResult;
use crate::lock::ProcessLock;
use crate::paths::AgentPaths;

/// Per-session history ring budget, in bytes.
const HISTORY_BUDGET_BYTES: usize = 1_000_000;

/// Load the config at `config_path`, acquire the process lock, bring up
/// every shared service, and run the agent until a shutdown signal
/// arrives.
///
/// # Errors
///
/// Returns [`crate::SupervisorError::AlreadyRunning`] if another instance
/// already holds the process lock, or
/// [`crate::SupervisorError::Config`] if the config cannot be loaded.
pub async fn run(config_path: &Path) -> SupervisorResult<()> {
    let paths = AgentPaths::from_config_path(config_path);
    let lock = ProcessLock::acquire(&paths)?;

    let config = redeven_config::load(config_path)?;
    let root_dir = config.resolved_root_dir().unwrap_or_else(|_| std::path::PathBuf::from("/"));
    let shell = config.resolved_shell();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment_id = %config.environment_id,
        root = %root_dir.display(),
        os = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        "starting redeven agent"
    );

    let services = SharedServices {
        fs: FsService::new(root_dir.clone()),
        terminal: Arc::new(TerminalManager::new(TerminalManagerConfig { shell, root: root_dir, history_budget_bytes: HISTORY_BUDGET_BYTES })),
        monitor: Arc::new(MonitorService::new()),
        registry: SessionRegistry::new(),
    };

    let control_cancellation = CancellationToken::new();
    let control_client = ControlClient::new(ControlClientConfig {
        coordinator_url: config.direct.ws_url.clone(),
        env_public_id: config.environment_id.clone(),
        agent_instance_id: config.agent_instance_id.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        hostname: hostname(),
    });

    let (grant_tx, mut grant_rx) = mpsc::channel(64);
    let control_run_cancellation = control_cancellation.clone();
    let control_handle = tokio::spawn(async move {
        if let Err(error) = control_client.run(grant_tx, control_run_cancellation).await {
            warn!(%error, "control channel task ended with an error");
        }
    });

    let mut session_handles = Vec::new();
    let mut sigterm = signal(SignalKind::terminate()).map_err(crate::error::SupervisorError::Signal)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            delivery = grant_rx.recv() => {
                match delivery {
                    Some(delivery) => {
                        if let Some(handle) = accept_grant(delivery, &config.environment_id, &config.permission_policy, &services.registry, &services).await {
                            session_handles.push(handle);
                        }
                    }
                    None => {
                        info!("control channel stopped for good, shutting down");
                        break;
                    }
                }
            }
        }
    }

    control_cancellation.cancel();
    services.registry.cancel_all().await;
    services.terminal.shutdown().await;

    let _ = tokio::time::timeout(Duration::from_secs(5), control_handle).await;
    for handle in session_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    drop(lock);
    info!("shutdown complete");
    Ok(())
}

fn hostname() -> String {
    nix::unistd::gethostname().map(|name| name.to_string_lossy().into_owned()).unwrap_or_else(|_| "unknown".to_string())
}
