//! RPC Methods - JSON-RPC method handlers
//!
//! Thin adapters from decoded params onto the coordinator.

use market_core::{
    CoordinatorNode, Delivery, Message, MetricsCollector, MetricsSnapshot, Snapshot,
};
use std::sync::Arc;

/// RPC context shared across handlers
pub struct RpcContext {
    pub node: Arc<CoordinatorNode>,
    /// Present when the coordinator records metrics in process
    pub metrics: Option<Arc<MetricsCollector>>,
}

impl RpcContext {
    pub fn new(node: Arc<CoordinatorNode>) -> Self {
        Self {
            node,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

// ============ RPC Handlers ============

/// Handle submitMessage RPC method
pub fn handle_submit_message(ctx: &RpcContext, message: Message) -> Result<Delivery, RpcError> {
    Ok(ctx.node.receive(message))
}

/// Handle getState RPC method
pub fn handle_get_state(ctx: &RpcContext) -> Result<Snapshot, RpcError> {
    Ok(ctx.node.snapshot())
}

/// Handle getClock RPC method
pub fn handle_get_clock(ctx: &RpcContext) -> Result<u64, RpcError> {
    Ok(ctx.node.current_time())
}

/// Handle getMetrics RPC method
pub fn handle_get_metrics(ctx: &RpcContext) -> Result<MetricsSnapshot, RpcError> {
    ctx.metrics
        .as_ref()
        .map(|metrics| metrics.snapshot())
        .ok_or_else(|| RpcError::InternalError("metrics are not collected on this node".into()))
}

/// Handle getHealth RPC method
pub fn handle_get_health() -> Result<String, RpcError> {
    Ok("ok".to_string())
}

// ============ Error Types ============

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("Method not found: {0}")]
    MethodNotFound(String),
}

impl RpcError {
    /// JSON-RPC error code
    pub fn code(&self) -> i32 {
        match self {
            RpcError::ParseError(_) => -32700,
            RpcError::InvalidRequest(_) => -32600,
            RpcError::InvalidParams(_) => -32602,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InternalError(_) => -32603,
        }
    }
}
