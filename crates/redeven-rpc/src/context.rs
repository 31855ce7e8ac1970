use redeven_core::ChannelId;
use redeven_permissions::PermissionSet;
use tokio_util::sync::CancellationToken;

/// Per-stream context passed to every handler invocation.
///
/// Cloning is cheap: `cancellation` is a shared token and `permissions` is
/// `Copy`. Cancelled once the owning tunnel stream closes.
#[derive(Debug, Clone)]
pub struct RpcContext {
    /// The tunnel session this stream belongs to.
    pub channel_id: ChannelId,
    /// The session's effective permission set, already clamped at
    /// acceptance time. Handlers never re-derive this.
    pub permissions: PermissionSet,
    /// Cancelled when the owning stream closes; handlers doing long-lived
    /// work should select on this rather than running unbounded.
    pub cancellation: CancellationToken,
}

impl RpcContext {
    /// Build a new context for one stream.
    #[must_use]
    pub fn new(channel_id: ChannelId, permissions: PermissionSet) -> Self {
        Self { channel_id, permissions, cancellation: CancellationToken::new() }
    }
}
