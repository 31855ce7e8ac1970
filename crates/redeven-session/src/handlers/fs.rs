//! FS request handlers (type ids 1001-1005).

use redeven_core::AgentError;
use redeven_rpc::{RpcContext, RpcHandler};
use redeven_vfs::{FsService, ReadEncoding};
use serde::Deserialize;

/// `fs/list` (1001).
pub struct ListHandler(pub FsService);

#[derive(Deserialize)]
struct ListRequest {
    #[serde(default = "root_path")]
    path: String,
    #[serde(default)]
    show_hidden: bool,
}

fn root_path() -> String {
    "/".to_string()
}

#[async_trait::async_trait]
impl RpcHandler for ListHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: ListRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        let entries = self.0.list(&ctx.permissions, &request.path, request.show_hidden).await?;
        Ok(serde_json::json!({ "entries": entries }))
    }
}

/// `fs/read` (1002).
pub struct ReadHandler(pub FsService);

#[derive(Deserialize)]
struct ReadRequest {
    path: String,
    #[serde(default = "default_encoding")]
    encoding: ReadEncoding,
}

fn default_encoding() -> ReadEncoding {
    ReadEncoding::Utf8
}

#[async_trait::async_trait]
impl RpcHandler for ReadHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: ReadRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        let content = self.0.read(&ctx.permissions, &request.path, request.encoding).await?;
        Ok(serde_json::json!({ "content": content, "encoding": request.encoding }))
    }
}

/// `fs/write` (1003).
pub struct WriteHandler(pub FsService);

#[derive(Deserialize)]
struct WriteRequest {
    path: String,
    content: String,
    #[serde(default = "default_encoding")]
    encoding: ReadEncoding,
    #[serde(default)]
    create_dirs: bool,
}

#[async_trait::async_trait]
impl RpcHandler for WriteHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: WriteRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        self.0.write(&ctx.permissions, &request.path, &request.content, request.encoding, request.create_dirs).await?;
        Ok(serde_json::json!({}))
    }
}

/// `fs/delete` (1004).
pub struct DeleteHandler(pub FsService);

#[derive(Deserialize)]
struct DeleteRequest {
    path: String,
    #[serde(default)]
    recursive: bool,
}

#[async_trait::async_trait]
impl RpcHandler for DeleteHandler {
    async fn handle(&self, ctx: &RpcContext, payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let request: DeleteRequest = serde_json::from_value(payload).map_err(|source| AgentError::InvalidRequest(source.to_string()))?;
        self.0.delete(&ctx.permissions, &request.path, request.recursive).await?;
        Ok(serde_json::json!({}))
    }
}

/// `fs/get_home` (1005).
pub struct GetHomeHandler(pub FsService);

#[async_trait::async_trait]
impl RpcHandler for GetHomeHandler {
    async fn handle(&self, ctx: &RpcContext, _payload: serde_json::Value) -> Result<serde_json::Value, AgentError> {
        let home = self.0.get_home(&ctx.permissions)?;
        Ok(serde_json::json!({ "home": home }))
    }
}
