//! Market RPC - JSON-RPC transport for the coordinator
//!
//! - HTTP JSON-RPC server: submitMessage, getState, getClock, getMetrics, getHealth
//! - HTTP client implementing `MarketTransport` for remote agents

pub mod client;
pub mod http_server;
pub mod methods;

pub use client::{RpcClient, DEFAULT_REQUEST_TIMEOUT};
pub use http_server::HttpRpcServer;
pub use methods::{RpcContext, RpcError};

/// Address the coordinator serves JSON-RPC on by default
pub const DEFAULT_RPC_ADDR: &str = "127.0.0.1:8899";

/// URL agents reach a default coordinator at
pub const DEFAULT_COORDINATOR_URL: &str = "http://127.0.0.1:8899";
