use std::collections::HashMap;
use std::sync::Arc;

use redeven_core::AgentError;

use crate::context::RpcContext;

/// One registered RPC method. Implementations convert their own leaf
/// error type into [`AgentError`] before returning.
#[async_trait::async_trait]
pub trait RpcHandler: Send + Sync {
    /// Handle one request's JSON payload and return its JSON reply.
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError>;
}

/// Type id → handler lookup table. Ranges by family: FS 1001–1010,
/// Terminal 2001–2012, Monitor 3001, Sys 4001, Sessions 5001, control-plane
/// 41001–41003.
pub type HandlerMap = HashMap<u32, Arc<dyn RpcHandler>>;

/// Builder for a [`HandlerMap`], so call sites can register handlers with
/// a fluent chain instead of constructing the map by hand.
#[derive(Default)]
pub struct HandlerMapBuilder {
    handlers: HandlerMap,
}

impl HandlerMapBuilder {
    /// Start with an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `type_id`. Overwrites any prior registration
    /// for the same id.
    #[must_use]
    pub fn with(mut self, type_id: u32, handler: Arc<dyn RpcHandler>) -> Self {
        self.handlers.insert(type_id, handler);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> HandlerMap {
        self.handlers
    }
}
