//! Cross-session visibility handler (type id 5001).

use redeven_core::AgentError;
use redeven_registry::SessionRegistry;
use redeven_rpc::{RpcContext, RpcHandler};

/// `sessions/list_active` (5001).
pub struct ListActiveHandler(pub SessionRegistry);

#[async_trait::async_trait]
impl RpcHandler for ListActiveHandler {
    async fn handle(&self, ctx: &RpcContext, _payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        if !ctx.permissions.execute {
            return Err(AgentError::PermissionDenied("execute permission required to list active sessions".to_string()));
        }
        let sessions = self.0.list_active().await;
        Ok(serde_json::json!({ "sessions": sessions }))
    }
}
