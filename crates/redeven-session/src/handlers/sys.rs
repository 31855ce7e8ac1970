//! Host/agent info handler (type id 4001).

use redeven_core::AgentError;
use redeven_rpc::{RpcContext, RpcHandler};
use serde::Serialize;

#[derive(Serialize)]
struct SysInfo {
    agent_version: &'static str,
    os: &'static str,
    arch: &'static str,
    server_unix_ms: i64,
}

/// `sys/info` (4001). No session state to read; always answers from
/// build-time constants plus the current clock.
pub struct SysInfoHandler;

#[async_trait::async_trait]
impl RpcHandler for SysInfoHandler {
    async fn handle(&self, _ctx: &RpcContext, _payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let info = SysInfo {
            agent_version: env!("CARGO_PKG_VERSION"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            server_unix_ms: chrono::Utc::now().timestamp_millis(),
        };
        Ok(serde_json::json!(info))
    }
}
