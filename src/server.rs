use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::config::GatewayConfig;
use crate::handlers::{self, health::HealthResponse, ToolInvoker};
use crate::protocol::JsonRpcResponse;
use crate::registry::ToolRegistry;
use crate::weather::{OpenWeatherBackend, WeatherBackend};

/// Maximum bytes per JSON-RPC message (1 MiB).
const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Build the gateway router: `POST /message` and `GET /health`.
pub fn router(invoker: Arc<ToolInvoker>) -> Router {
    Router::new()
        .route("/message", post(message))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_MESSAGE_BYTES))
        .with_state(invoker)
}

/// Construct the production invoker: built-in registry plus OpenWeather.
pub fn invoker_from_config(config: &GatewayConfig) -> Result<Arc<ToolInvoker>, String> {
    let backend = OpenWeatherBackend::new(config.weather.clone()).map_err(|e| e.to_string())?;
    let weather: Arc<dyn WeatherBackend> = Arc::new(backend);
    Ok(Arc::new(ToolInvoker::new(
        Arc::new(ToolRegistry::builtin()),
        weather,
        config.tool_timeout,
    )))
}

/// A running axum server with graceful shutdown.
pub struct HttpServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl HttpServer {
    /// Bind `addr` and start serving `app` in the background.
    pub async fn start(addr: SocketAddr, app: Router) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "HTTP server stopped with error");
            }
        });

        tracing::info!(%addr, "HTTP server listening");
        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and wait for in-flight requests to drain.
    pub async fn shutdown(mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        tracing::info!(addr = %self.addr, "HTTP server stopped");
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        if let Some(sender) = self.shutdown.take() {
            let _ = sender.send(());
        }
    }
}

async fn message(State(invoker): State<Arc<ToolInvoker>>, body: Bytes) -> Json<JsonRpcResponse> {
    Json(handlers::handle_message(&body, invoker).await)
}

async fn health() -> Json<HealthResponse> {
    Json(handlers::health::handle())
}
