//! Wire types for the coordinator's direct `WebSocket` endpoint.
//!
//! Each message is one JSON text frame; `WebSocket` already provides
//! message framing, so unlike the tunnel's RPC dispatcher there is no
//! additional length prefix.

use redeven_core::FloeApp;
use serde::{Deserialize, Serialize};

/// Control-plane type ids.
pub mod type_id {
    /// `register` request.
    pub const REGISTER: u32 = 41_001;
    /// `heartbeat` request.
    pub const HEARTBEAT: u32 = 41_002;
    /// `grant_server` notify.
    pub const GRANT_SERVER: u32 = 41_003;
}

/// Which of the three RPC frame shapes a [`ControlMessage`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// A request awaiting exactly one reply.
    Request,
    /// A reply to a prior request, matched by `correlation_id`.
    Reply,
    /// A one-way notification.
    Notify,
}

/// One JSON message on the control-channel `WebSocket`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Frame shape.
    pub kind: FrameKind,
    /// Routes to a handler or a waiting caller.
    pub type_id: u32,
    /// Echoed by the reply; `0` for notifications.
    #[serde(default)]
    pub correlation_id: u32,
    /// Opaque payload, shape depends on `type_id`.
    pub payload: serde_json::Value,
}

impl ControlMessage {
    /// Build a request frame.
    #[must_use]
    pub fn request(type_id: u32, correlation_id: u32, payload: serde_json::Value) -> Self {
        Self { kind: FrameKind::Request, type_id, correlation_id, payload }
    }
}

/// Body of a `register` request.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    /// Public id of the environment this agent belongs to.
    pub env_public_id: String,
    /// Stable per-install id, generated at bootstrap.
    pub agent_instance_id: String,
    /// Agent build version.
    pub version: String,
    /// Host OS, e.g. `linux`.
    pub os: String,
    /// Host architecture, e.g. `x86_64`.
    pub arch: String,
    /// Host name, for operator-facing diagnostics.
    pub hostname: String,
}

/// Body of a `heartbeat` request.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    /// Milliseconds since the Unix epoch when the heartbeat was sent.
    pub now_unix_ms: i64,
}

/// `{ok}` reply shared by `register` and `heartbeat`.
#[derive(Debug, Clone, Deserialize)]
pub struct OkReply {
    /// Always `true` on success; an error is carried via an RPC error
    /// reply instead of `ok: false`.
    pub ok: bool,
}

/// The `grant_server` half of a `grant_server` notify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantServer {
    /// Tunnel session id the grant authorizes.
    pub channel_id: String,
    /// `WebSocket` URL the agent dials to establish the tunnel.
    pub tunnel_url: String,
}

/// The `session_meta` half of a `grant_server` notify.
///
/// Carries the grant's *declared* permissions as raw booleans; the agent
/// must still intersect these with its local cap (`PermissionPolicy::resolve`
/// in `redeven-permissions`) before they become a
/// [`redeven_core::SessionMeta`] — this type never claims to be the final
/// effective permission set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantSessionMeta {
    /// Tunnel session id; matches `GrantServer::channel_id`.
    pub channel_id: String,
    /// The environment id this grant was issued for.
    pub endpoint_id: String,
    /// Which application protocol this session serves.
    pub floe_app: FloeApp,
    /// Optional code-space identifier, when the grant targets one.
    pub code_space_id: Option<String>,
    /// Stable public id of the requesting user.
    pub user_public_id: String,
    /// The requesting user's email, for audit logging.
    pub user_email: String,
    /// Declared (not yet clamped) read permission.
    pub can_read_files: bool,
    /// Declared (not yet clamped) write permission.
    pub can_write_files: bool,
    /// Declared (not yet clamped) execute permission.
    pub can_execute: bool,
}

/// A fully parsed `grant_server` notify, handed to the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantDelivery {
    /// Tunnel connection details.
    pub grant_server: GrantServer,
    /// Declared session metadata, not yet permission-clamped.
    pub session_meta: GrantSessionMeta,
}

/// Build a `register` request frame.
#[must_use]
pub fn build_register(correlation_id: u32, body: &RegisterRequest) -> ControlMessage {
    ControlMessage::request(type_id::REGISTER, correlation_id, serde_json::json!(body))
}

/// Build a `heartbeat` request frame.
#[must_use]
pub fn build_heartbeat(correlation_id: u32, now_unix_ms: i64) -> ControlMessage {
    ControlMessage::request(type_id::HEARTBEAT, correlation_id, serde_json::json!(HeartbeatRequest { now_unix_ms }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_register_has_expected_type_id() {
        let msg = build_register(
            1,
            &RegisterRequest {
                env_public_id: "env-1".into(),
                agent_instance_id: "agent-1".into(),
                version: "0.1.0".into(),
                os: "linux".into(),
                arch: "x86_64".into(),
                hostname: "host-1".into(),
            },
        );
        assert_eq!(msg.type_id, type_id::REGISTER);
        assert_eq!(msg.kind, FrameKind::Request);
        assert_eq!(msg.payload["env_public_id"], "env-1");
    }

    #[test]
    fn build_heartbeat_carries_timestamp() {
        let msg = build_heartbeat(2, 1_700_000_000_000);
        assert_eq!(msg.type_id, type_id::HEARTBEAT);
        assert_eq!(msg.payload["now_unix_ms"], 1_700_000_000_000i64);
    }

    #[test]
    fn grant_delivery_deserializes() {
        let json = serde_json::json!({
            "grant_server": { "channel_id": "chan-1", "tunnel_url": "wss://tunnel.example/chan-1" },
            "session_meta": {
                "channel_id": "chan-1",
                "endpoint_id": "env-1",
                "floe_app": "terminal",
                "code_space_id": null,
                "user_public_id": "user-1",
                "user_email": "user@example.com",
                "can_read_files": true,
                "can_write_files": false,
                "can_execute": true,
            },
        });
        let delivery: GrantDelivery = serde_json::from_value(json).unwrap();
        assert_eq!(delivery.grant_server.channel_id, "chan-1");
        assert_eq!(delivery.session_meta.floe_app, FloeApp::Terminal);
        assert!(!delivery.session_meta.can_write_files);
    }

    #[test]
    fn ok_reply_parses() {
        let reply: OkReply = serde_json::from_value(serde_json::json!({ "ok": true })).unwrap();
        assert!(reply.ok);
    }
}
