//! Turns a `grant_server` delivery into a running data session, or drops
//! it (foreign environment id, duplicate `channel_id`).

use redeven_control::protocol::GrantDelivery;
use redeven_core::{ChannelId, SessionMeta};
use redeven_permissions::{PermissionPolicy, PermissionSet};
use redeven_registry::SessionRegistry;
use redeven_session::{SessionParams, SharedServices, run_session};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Accept one grant delivery.
///
/// Clamps the grant's declared permissions through `policy.resolve`,
/// registers the session (dropping duplicates per `channel_id`), and
/// spawns its data-session task. Returns `None` without registering
/// anything if the grant's `endpoint_id` does not match `environment_id`,
/// or if the `channel_id` is already live.
pub async fn accept_grant(
    delivery: GrantDelivery,
    environment_id: &str,
    policy: &PermissionPolicy,
    registry: &SessionRegistry,
    services: &SharedServices,
) -> Option<JoinHandle<()>> {
    let GrantDelivery { grant_server, session_meta } = delivery;

    if session_meta.endpoint_id != environment_id {
        warn!(
            channel_id = %session_meta.channel_id,
            declared = %session_meta.endpoint_id,
            configured = %environment_id,
            "dropping grant for a foreign environment id"
        );
        return None;
    }

    let declared = PermissionSet { read: session_meta.can_read_files, write: session_meta.can_write_files, execute: session_meta.can_execute };
    let local_cap = policy.resolve(&session_meta.user_public_id, session_meta.floe_app.as_str());
    let effective = declared.intersect(local_cap);

    info!(
        channel_id = %session_meta.channel_id,
        user = %session_meta.user_public_id,
        app = session_meta.floe_app.as_str(),
        declared = ?declared,
        cap = ?local_cap,
        effective = ?effective,
        "resolved session permissions"
    );

    let channel_id = ChannelId::from(session_meta.channel_id.clone());
    let meta = SessionMeta {
        channel_id: channel_id.clone(),
        endpoint_id: session_meta.endpoint_id,
        floe_app: session_meta.floe_app,
        code_space_id: session_meta.code_space_id,
        user_public_id: session_meta.user_public_id,
        user_email: session_meta.user_email,
        permissions: effective,
    };

    let cancellation = registry.insert(meta).await?;

    let (connected_tx, connected_rx) = oneshot::channel();
    let mark_registry = registry.clone();
    let mark_channel_id = channel_id.clone();
    tokio::spawn(async move {
        if connected_rx.await.is_ok() {
            mark_registry.mark_connected(&mark_channel_id, now_unix_ms()).await;
        }
    });

    let params = SessionParams {
        tunnel_url: grant_server.tunnel_url,
        channel_id: channel_id.clone(),
        permissions: effective,
        services: services.clone(),
        cancellation,
        connected_tx: Some(connected_tx),
    };
    let remove_registry = registry.clone();
    Some(tokio::spawn(async move {
        run_session(params).await;
        remove_registry.remove(&channel_id).await;
    }))
}

fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use redeven_monitor::MonitorService;
    use redeven_terminal::{TerminalManager, TerminalManagerConfig};
    use redeven_test_support::{foreign_grant_delivery, test_grant_delivery};
    use redeven_vfs::FsService;

    use super::*;

    fn services() -> SharedServices {
        SharedServices {
            fs: FsService::new(std::env::temp_dir()),
            terminal: std::sync::Arc::new(TerminalManager::new(TerminalManagerConfig {
                shell: "/bin/sh".to_string(),
                root: std::env::temp_dir(),
                history_budget_bytes: 1_000,
            })),
            monitor: std::sync::Arc::new(MonitorService::new()),
            registry: SessionRegistry::new(),
        }
    }

    #[tokio::test]
    async fn foreign_endpoint_id_is_dropped_without_registering() {
        let services = services();
        let policy = PermissionPolicy::execute_read_write();
        let delivery = foreign_grant_delivery("env-1", "ws://127.0.0.1:0/tunnel");

        let handle = accept_grant(delivery, "env-1", &policy, &services.registry, &services).await;

        assert!(handle.is_none());
        assert!(services.registry.is_empty().await);
    }

    #[tokio::test]
    async fn matching_grant_registers_a_session() {
        let services = services();
        let policy = PermissionPolicy::execute_read_write();
        let delivery = test_grant_delivery("env-1", "ws://127.0.0.1:0/tunnel");

        let handle = accept_grant(delivery, "env-1", &policy, &services.registry, &services).await;

        assert!(handle.is_some());
        assert_eq!(services.registry.len().await, 1);
    }

    #[tokio::test]
    async fn declared_permissions_are_clamped_by_local_policy() {
        let services = services();
        let policy = PermissionPolicy::read_only();
        let delivery = test_grant_delivery("env-1", "ws://127.0.0.1:0/tunnel");
        let channel_id = ChannelId::from(delivery.session_meta.channel_id.clone());

        accept_grant(delivery, "env-1", &policy, &services.registry, &services).await;

        let active = services.registry.remove(&channel_id).await.unwrap();
        assert!(active.meta.permissions.read);
        assert!(!active.meta.permissions.write);
        assert!(!active.meta.permissions.execute);
    }
}
