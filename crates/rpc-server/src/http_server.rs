//! HTTP JSON-RPC Server
//!
//! Coordinator's remote-call surface: one POST endpoint speaking JSON-RPC 2.0
//! with positional params. Transport-level problems (bad JSON, wrong
//! envelope) are answered in-band with the standard error codes.

use crate::methods::{
    handle_get_clock, handle_get_health, handle_get_metrics, handle_get_state,
    handle_submit_message, RpcContext, RpcError,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

const JSONRPC_VERSION: &str = "2.0";

/// Incoming call envelope
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Reply envelope; exactly one of `result` and `error` is set
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, error: &RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }
}

/// HTTP RPC Server
pub struct HttpRpcServer {
    context: Arc<RpcContext>,
}

impl HttpRpcServer {
    pub fn new(context: Arc<RpcContext>) -> Self {
        Self { context }
    }

    /// Router with the RPC endpoint mounted at `/`
    pub fn router(self) -> Router {
        // dashboards poll getState from the browser
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            .route("/", post(handle_rpc))
            .layer(cors)
            .with_state(self.context)
    }

    /// Bind and run the server
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Run on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        tracing::info!("HTTP RPC server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn handle_rpc(State(context): State<Arc<RpcContext>>, body: Bytes) -> impl IntoResponse {
    let response = match decode_request(&body) {
        Ok(request) if request.jsonrpc != JSONRPC_VERSION => JsonRpcResponse::failure(
            request.id,
            &RpcError::InvalidRequest(format!("unsupported jsonrpc version {:?}", request.jsonrpc)),
        ),
        Ok(request) => match dispatch_method(&context, &request.method, request.params) {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                tracing::debug!("RPC {} failed: {}", request.method, e);
                JsonRpcResponse::failure(request.id, &e)
            }
        },
        // the id is unknown when the envelope itself is unreadable
        Err(e) => {
            tracing::debug!("Rejected RPC body: {}", e);
            JsonRpcResponse::failure(Value::Null, &e)
        }
    };

    (StatusCode::OK, Json(response))
}

fn decode_request(body: &[u8]) -> Result<JsonRpcRequest, RpcError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| RpcError::ParseError(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| RpcError::InvalidRequest(e.to_string()))
}

/// Take positional parameter `index` and decode it
fn positional<T: DeserializeOwned>(params: Value, index: usize, name: &str) -> Result<T, RpcError> {
    let raw = match params {
        Value::Array(mut items) if index < items.len() => items.swap_remove(index),
        _ => return Err(RpcError::InvalidParams(format!("missing {}", name))),
    };
    serde_json::from_value(raw)
        .map_err(|e| RpcError::InvalidParams(format!("invalid {}: {}", name, e)))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::InternalError(e.to_string()))
}

fn dispatch_method(ctx: &RpcContext, method: &str, params: Value) -> Result<Value, RpcError> {
    tracing::trace!("RPC method called: {}", method);
    match method {
        "submitMessage" => {
            let message = positional(params, 0, "message")?;
            to_value(handle_submit_message(ctx, message)?)
        }
        "getState" => to_value(handle_get_state(ctx)?),
        "getClock" => Ok(json!(handle_get_clock(ctx)?)),
        "getMetrics" => to_value(handle_get_metrics(ctx)?),
        "getHealth" => Ok(json!(handle_get_health()?)),
        "getVersion" => Ok(json!({ "market-sim": env!("CARGO_PKG_VERSION") })),
        _ => Err(RpcError::MethodNotFound(method.to_string())),
    }
}
