//! HTTP surface of the agent service: `GET /health`, `POST /query` and
//! `POST /sessions`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::openai::OpenAiOracle;
use super::oracle::DecisionOracle;
use super::session::{JsonlSessionLog, MemorySessionLog, SessionLog};
use super::{Agent, AgentError};
use crate::client::RpcClient;
use crate::config::AgentConfig;

pub const SERVICE_NAME: &str = "Weather Agent";

/// Shared state for the agent routes. `agent` is `None` when startup could
/// not build one; the service still answers `/health` in that case.
pub struct AgentContext {
    agent: Option<Arc<Agent>>,
}

impl AgentContext {
    pub fn ready(agent: Arc<Agent>) -> Self {
        Self { agent: Some(agent) }
    }

    pub fn unavailable() -> Self {
        Self { agent: None }
    }

    /// Build the agent from configuration and load the gateway's tools.
    ///
    /// Failing to reach the gateway is not fatal: the agent starts without
    /// tools. Failing to build the oracle, client or session log leaves the
    /// context unavailable.
    pub async fn init(config: &AgentConfig) -> Self {
        match build_agent(config) {
            Ok(agent) => {
                if !agent.discover_tools().await {
                    tracing::warn!(
                        gateway = %config.mcp_server_url,
                        "could not load tools from gateway; continuing without tools"
                    );
                }
                tracing::info!(model = agent.model(), tools = agent.tool_count(), "agent ready");
                Self::ready(Arc::new(agent))
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start agent");
                Self::unavailable()
            }
        }
    }

    pub fn agent(&self) -> Option<&Arc<Agent>> {
        self.agent.as_ref()
    }

    /// Release the agent, its HTTP clients and its session log.
    pub fn shutdown(self) {
        if let Some(agent) = self.agent {
            drop(agent);
            tracing::info!("agent stopped");
        }
    }
}

fn build_agent(config: &AgentConfig) -> Result<Agent, String> {
    let api_key = config
        .openai_api_key
        .clone()
        .ok_or_else(|| "OPENAI_API_KEY is not set".to_string())?;
    let oracle: Arc<dyn DecisionOracle> = Arc::new(
        OpenAiOracle::new(api_key, config.openai_base_url.clone(), config.model.clone())
            .map_err(|e| e.to_string())?,
    );

    let client = Arc::new(
        RpcClient::http(&config.mcp_server_url, config.rpc_timeout).map_err(|e| e.to_string())?,
    );

    let sessions: Arc<dyn SessionLog> = match &config.session_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "persisting sessions as JSON lines");
            Arc::new(JsonlSessionLog::open(dir).map_err(|e| e.to_string())?)
        }
        None => Arc::new(MemorySessionLog::new()),
    };

    Ok(Agent::new(oracle, client, sessions))
}

pub fn router(ctx: Arc<AgentContext>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .route("/sessions", post(create_session))
        .with_state(ctx)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize)]
struct ApiErrorBody {
    success: bool,
    error: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                success: false,
                error: message.into(),
            },
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Agent not available")
    }
}

/// Decode a JSON request body, reporting failures as a 400 in the
/// `{success:false, error}` shape.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::UnknownSession(id) => Self::not_found(format!("Unknown session: {id}")),
            AgentError::Session(e) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AgentHealth {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: String,
    pub agent_ready: bool,
    pub tools: usize,
}

async fn health(State(ctx): State<Arc<AgentContext>>) -> Json<AgentHealth> {
    Json(AgentHealth {
        status: "healthy",
        service: SERVICE_NAME,
        timestamp: chrono::Utc::now().to_rfc3339(),
        agent_ready: ctx.agent.is_some(),
        tools: ctx.agent.as_ref().map_or(0, |agent| agent.tool_count()),
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub response: String,
    pub timestamp: String,
    pub session_id: String,
}

async fn query(
    State(ctx): State<Arc<AgentContext>>,
    body: Bytes,
) -> Result<Json<QueryResponse>, ApiError> {
    let agent = ctx.agent.as_ref().ok_or_else(ApiError::unavailable)?;
    let request: QueryRequest = decode_body(&body)?;

    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    // A session id that is not a UUID cannot name an existing session.
    let session = match request.session_id.as_deref() {
        Some(raw) => Some(
            Uuid::parse_str(raw).map_err(|_| ApiError::not_found(format!("Unknown session: {raw}")))?,
        ),
        None => None,
    };

    tracing::info!(query_length = query.len(), "query received");
    let outcome = agent.process_query(session, query).await?;

    Ok(Json(QueryResponse {
        success: outcome.success,
        response: outcome.answer,
        timestamp: chrono::Utc::now().to_rfc3339(),
        session_id: outcome.session_id.to_string(),
    }))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

async fn create_session(
    State(ctx): State<Arc<AgentContext>>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let agent = ctx.agent.as_ref().ok_or_else(ApiError::unavailable)?;
    // An empty body asks for a default-named session.
    let request: CreateSessionRequest = if body.is_empty() {
        CreateSessionRequest::default()
    } else {
        decode_body(&body)?
    };
    let id = agent.start_session(request.name.as_deref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: id.to_string(),
        }),
    ))
}
