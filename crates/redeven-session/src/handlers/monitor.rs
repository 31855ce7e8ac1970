//! Monitor request handler (type id 3001).

use std::sync::Arc;

use redeven_core::AgentError;
use redeven_monitor::{MonitorService, SortBy};
use redeven_rpc::{RpcContext, RpcHandler};
use serde::Deserialize;

/// `monitor` (3001).
pub struct MonitorHandler(pub Arc<MonitorService>);

#[derive(Deserialize)]
struct MonitorRequest {
    #[serde(default = "default_sort_by")]
    sort_by: SortBy,
}

fn default_sort_by() -> SortBy {
    SortBy::Cpu
}

#[async_trait::async_trait]
impl RpcHandler for MonitorHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: MonitorRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        let snapshot = self.0.snapshot(ctx.permissions, request.sort_by).await?;
        Ok(serde_json::json!(snapshot))
    }
}
