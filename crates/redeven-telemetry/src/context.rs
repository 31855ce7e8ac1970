//! Request correlation context.

use chrono::{DateTime, Utc};
use tracing::Span;
use uuid::Uuid;

/// Identifies a single unit of work (an RPC call, a control-channel event,
/// a terminal attach) for correlation across log lines.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    component: String,
    operation: Option<String>,
    started_at: DateTime<Utc>,
}

impl RequestContext {
    /// Start a new context for `component` (e.g. `"rpc"`, `"control"`,
    /// `"terminal"`).
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            component: component.into(),
            operation: None,
            started_at: Utc::now(),
        }
    }

    /// Attach an operation name, e.g. a method name like `fs/read_file`.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// This context's unique request id.
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// When this context was created.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Build a `tracing` span carrying this context's fields.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            component = %self.component,
            operation = self.operation.as_deref().unwrap_or("-"),
        )
    }

    /// Enter this context's span, returning a guard that exits it on drop.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard { _entered: self.span().entered() }
    }
}

/// Guard returned by [`RequestContext::enter`]; exits the span on drop.
pub struct RequestGuard {
    _entered: tracing::span::EnteredSpan,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_operation_is_visible_on_the_built_span() {
        let ctx = RequestContext::new("rpc").with_operation("fs/read_file");
        let _guard = ctx.enter();
        tracing::info!("inside span");
    }

    #[test]
    fn each_context_gets_a_distinct_request_id() {
        let a = RequestContext::new("rpc");
        let b = RequestContext::new("rpc");
        assert_ne!(a.request_id(), b.request_id());
    }
}
