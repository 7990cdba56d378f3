//! RPC Client - agents' side of the transport boundary
//!
//! Wraps a jsonrpsee HTTP client. Every call is bounded by the request
//! timeout and never retried; the agent decides what a failure means.

use async_trait::async_trait;
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use market_core::{Delivery, MarketTransport, Message, Snapshot, TransportError};
use std::time::Duration;

/// Default per-call timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// JSON-RPC client for a remote coordinator
pub struct RpcClient {
    client: HttpClient,
    url: String,
}

impl RpcClient {
    /// Create a client; no connection is made until the first call
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = HttpClientBuilder::default()
            .request_timeout(request_timeout)
            .build(url)
            .map_err(|e| TransportError::Unreachable(format!("{}: {}", url, e)))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Coordinator endpoint this client talks to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Remote coordinator's logical time
    pub async fn get_clock(&self) -> Result<u64, TransportError> {
        self.client
            .request("getClock", rpc_params![])
            .await
            .map_err(map_error)
    }

    /// Health check
    pub async fn get_health(&self) -> Result<String, TransportError> {
        self.client
            .request("getHealth", rpc_params![])
            .await
            .map_err(map_error)
    }
}

fn map_error(error: ClientError) -> TransportError {
    match error {
        ClientError::Call(obj) => TransportError::Remote {
            code: obj.code(),
            message: obj.message().to_string(),
        },
        ClientError::RequestTimeout => TransportError::Timeout,
        ClientError::ParseError(e) => TransportError::Decode(e.to_string()),
        other => TransportError::Unreachable(other.to_string()),
    }
}

#[async_trait]
impl MarketTransport for RpcClient {
    async fn submit(&self, message: Message) -> Result<Delivery, TransportError> {
        self.client
            .request("submitMessage", rpc_params![message])
            .await
            .map_err(map_error)
    }

    async fn get_state(&self) -> Result<Snapshot, TransportError> {
        self.client
            .request("getState", rpc_params![])
            .await
            .map_err(map_error)
    }
}
