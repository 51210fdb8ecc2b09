//! JSON-RPC client side: transports, correlation ids and tier-tagged outcomes.
//!
//! Every call ends in exactly one [`RpcOutcome`] variant, so callers branch
//! on data instead of catching errors:
//!
//! - [`RpcOutcome::Transport`]: the request never produced a usable response
//!   (connection refused, timeout, non-2xx, malformed body, id mismatch).
//! - [`RpcOutcome::Protocol`]: the server answered with a JSON-RPC `error`.
//! - [`RpcOutcome::Success`]: the server answered with a `result`.
//!
//! Business faults live one level deeper, inside a successful `tools/call`
//! result; see [`execution`].

pub mod discovery;
pub mod execution;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};

pub use discovery::{InvocationTarget, ToolCatalog, ToolDiscovery};
pub use execution::{ToolCallOutcome, ToolExecutor};

/// Path of the JSON-RPC endpoint relative to the gateway base URL.
pub const MESSAGE_PATH: &str = "/message";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Moves one JSON-RPC envelope to a server and back.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;
}

/// HTTP transport: `POST {base_url}/message` with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: format!("{}{MESSAGE_PATH}", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let response = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout)
                } else {
                    TransportError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::InvalidResponse(format!("failed to read response body: {e}"))
            }
        })?;

        serde_json::from_slice::<JsonRpcResponse>(&body).map_err(|e| {
            let preview: String = String::from_utf8_lossy(&body).chars().take(240).collect();
            TransportError::InvalidResponse(format!("{e}. Body preview: {preview}"))
        })
    }
}

/// Thread-safe sequential request ids, starting at 1.
#[derive(Debug)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> RpcId {
        RpcId::from(self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one JSON-RPC round trip, tagged by failure tier.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome {
    Transport(TransportError),
    Protocol(JsonRpcError),
    Success(Value),
}

/// JSON-RPC client shared by discovery, execution and the compliance checks.
pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
    ids: RequestIdGenerator,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            ids: RequestIdGenerator::new(),
        }
    }

    /// Client over [`HttpTransport`] with a bounded per-call timeout.
    pub fn http(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(HttpTransport::new(base_url, timeout)?)))
    }

    pub fn next_id(&self) -> RpcId {
        self.ids.next_id()
    }

    /// Call `method` with a fresh correlation id.
    pub async fn call(&self, method: &str, params: Option<Value>) -> RpcOutcome {
        let request = JsonRpcRequest::new(self.next_id(), method, params);
        self.send(&request).await
    }

    /// Send a prepared request and classify the reply.
    ///
    /// A reply that does not echo the request id, or that carries both or
    /// neither of `result`/`error`, is a transport fault.
    pub async fn send(&self, request: &JsonRpcRequest) -> RpcOutcome {
        let method = request.method.as_deref().unwrap_or("<none>");
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(method, error = %e, "JSON-RPC transport failure");
                return RpcOutcome::Transport(e);
            }
        };

        if response.id != request.id {
            let err = TransportError::InvalidResponse(format!(
                "response id {:?} does not match request id {:?}",
                response.id, request.id
            ));
            tracing::error!(method, error = %err, "JSON-RPC correlation failure");
            return RpcOutcome::Transport(err);
        }

        match (response.result, response.error) {
            (Some(result), None) => RpcOutcome::Success(result),
            (None, Some(error)) => {
                tracing::warn!(method, code = error.code, message = %error.message, "JSON-RPC error response");
                RpcOutcome::Protocol(error)
            }
            _ => {
                let err = TransportError::InvalidResponse(
                    "response must carry exactly one of 'result' and 'error'".into(),
                );
                tracing::error!(method, error = %err, "malformed JSON-RPC response");
                RpcOutcome::Transport(err)
            }
        }
    }
}
