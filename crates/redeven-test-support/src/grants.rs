//! Grant-delivery fixtures for exercising the acceptance pipeline.

use redeven_control::protocol::{GrantDelivery, GrantServer, GrantSessionMeta};
use redeven_core::FloeApp;
use uuid::Uuid;

/// A [`GrantDelivery`] for `environment_id`, with full read/write/execute
/// permissions declared.
#[must_use]
pub fn test_grant_delivery(environment_id: &str, tunnel_url: &str) -> GrantDelivery {
    let channel_id = format!("chan-{}", Uuid::new_v4());
    GrantDelivery {
        grant_server: GrantServer { channel_id: channel_id.clone(), tunnel_url: tunnel_url.to_string() },
        session_meta: GrantSessionMeta {
            channel_id,
            endpoint_id: environment_id.to_string(),
            floe_app: FloeApp::Terminal,
            code_space_id: None,
            user_public_id: "user-test-0001".to_string(),
            user_email: "test-user@example.com".to_string(),
            can_read_files: true,
            can_write_files: true,
            can_execute: true,
        },
    }
}

/// A [`GrantDelivery`] declared for an environment id other than
/// `environment_id`, for exercising the foreign-grant rejection path.
#[must_use]
pub fn foreign_grant_delivery(environment_id: &str, tunnel_url: &str) -> GrantDelivery {
    let mut delivery = test_grant_delivery(environment_id, tunnel_url);
    delivery.session_meta.endpoint_id = format!("{environment_id}-other");
    delivery
}
