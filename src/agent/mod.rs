//! Conversational agent: drives one turn at a time through the decision
//! oracle and the gateway's tools, and persists completed turns.
//!
//! A turn moves through [`TurnState`]:
//!
//! ```text
//! Idle -> AwaitingModelDecision -> DirectAnswer -> Idle
//!                               \-> ToolsRequested -> AwaitingToolResults
//!                                   -> AwaitingFinalAnswer -> Idle
//! ```
//!
//! Any failure aborts the turn; nothing of it is persisted and the caller
//! gets [`prompt::APOLOGY`].

pub mod openai;
pub mod oracle;
pub mod prompt;
pub mod server;
pub mod session;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::client::{RpcClient, ToolCatalog, ToolDiscovery, ToolExecutor};
use oracle::{ChatMessage, Decision, DecisionOracle, OracleError, ToolInvocation};
use session::{Role, SessionEntry, SessionId, SessionLog, SessionLogError};

/// Tool results are cut to this many characters in turn metadata. The
/// oracle always receives the full text.
pub const TOOL_RESULT_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingModelDecision,
    DirectAnswer,
    ToolsRequested,
    AwaitingToolResults,
    AwaitingFinalAnswer,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
    #[error(transparent)]
    Session(SessionLogError),
}

impl From<SessionLogError> for AgentError {
    fn from(e: SessionLogError) -> Self {
        match e {
            SessionLogError::NotFound(id) => Self::UnknownSession(id),
            other => Self::Session(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum TurnError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("model requested tools while a final answer was expected")]
    UnexpectedToolCalls,
    #[error("failed to persist turn: {0}")]
    Persist(#[from] SessionLogError),
}

/// Per-invocation record kept in assistant metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResultRecord {
    pub tool: String,
    pub arguments: Map<String, Value>,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub answer: String,
    pub success: bool,
    pub used_tools: bool,
}

struct CompletedTurn {
    answer: String,
    tool_calls: Vec<ToolInvocation>,
    tool_results: Vec<ToolResultRecord>,
}

pub struct Agent {
    oracle: Arc<dyn DecisionOracle>,
    discovery: ToolDiscovery,
    executor: ToolExecutor,
    sessions: Arc<dyn SessionLog>,
    system_prompt: String,
    default_session: tokio::sync::Mutex<Option<SessionId>>,
    session_locks: SessionLocks,
}

type SessionLocks = parking_lot::Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>;

/// A claim on one session's turn lock. Dropping the last claim removes the
/// lock from the map.
struct SessionLease<'a> {
    locks: &'a SessionLocks,
    session: SessionId,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // The map and this lease are the only holders: no turn is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.session);
        }
    }
}

impl Agent {
    pub fn new(
        oracle: Arc<dyn DecisionOracle>,
        client: Arc<RpcClient>,
        sessions: Arc<dyn SessionLog>,
    ) -> Self {
        Self {
            oracle,
            discovery: ToolDiscovery::new(client.clone()),
            executor: ToolExecutor::new(client),
            sessions,
            system_prompt: prompt::SYSTEM_PROMPT.to_string(),
            default_session: tokio::sync::Mutex::new(None),
            session_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Refresh the tool catalog. On failure the agent keeps its previous
    /// catalog and stays usable.
    pub async fn discover_tools(&self) -> bool {
        self.discovery.discover().await
    }

    pub fn catalog(&self) -> Arc<ToolCatalog> {
        self.discovery.catalog()
    }

    pub fn tool_count(&self) -> usize {
        self.discovery.catalog().len()
    }

    pub fn model(&self) -> &str {
        self.oracle.model()
    }

    pub async fn start_session(&self, name: Option<&str>) -> Result<SessionId, AgentError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => Utc::now().format("Session_%Y%m%d_%H%M%S").to_string(),
        };
        Ok(self.with_log(move |log| log.create(&name)).await?)
    }

    pub async fn history(&self, session: SessionId) -> Result<Vec<SessionEntry>, AgentError> {
        Ok(self.with_log(move |log| log.read(session)).await?)
    }

    /// Run blocking session-log work on the blocking pool.
    async fn with_log<T, F>(&self, work: F) -> Result<T, SessionLogError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SessionLog) -> Result<T, SessionLogError> + Send + 'static,
    {
        let sessions = Arc::clone(&self.sessions);
        tokio::task::spawn_blocking(move || work(sessions.as_ref())).await?
    }

    async fn default_session(&self) -> Result<SessionId, AgentError> {
        let mut current = self.default_session.lock().await;
        if let Some(id) = *current {
            return Ok(id);
        }
        let id = self.start_session(None).await?;
        *current = Some(id);
        Ok(id)
    }

    fn lease_session(&self, session: SessionId) -> SessionLease<'_> {
        let lock = self.session_locks.lock().entry(session).or_default().clone();
        SessionLease {
            locks: &self.session_locks,
            session,
            lock,
        }
    }

    /// Run one turn for `query`.
    ///
    /// Without a session the agent's default session is used, created on
    /// first use. Turns on the same session are serialized. Only an unknown
    /// or unreadable session is an `Err`; a failed turn is an outcome with
    /// `success: false` and the apology text.
    pub async fn process_query(
        &self,
        session: Option<SessionId>,
        query: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let session_id = match session {
            Some(id) => id,
            None => self.default_session().await?,
        };

        let lease = self.lease_session(session_id);
        let _guard = lease.lock.lock().await;

        let history = self.with_log(move |log| log.read(session_id)).await?;

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::System(self.system_prompt.clone()));
        for entry in history {
            messages.push(match entry.role {
                Role::User => ChatMessage::User(entry.content),
                Role::Assistant => ChatMessage::assistant(entry.content),
            });
        }
        messages.push(ChatMessage::User(query.to_string()));

        let turn = match self.run_turn(messages).await {
            Ok(turn) => turn,
            Err(e) => return Ok(self.failed(session_id, e)),
        };
        if let Err(e) = self.persist(session_id, query, &turn).await {
            return Ok(self.failed(session_id, e.into()));
        }

        tracing::info!(
            session_id = %session_id,
            tool_calls = turn.tool_calls.len(),
            "turn completed"
        );
        Ok(TurnOutcome {
            session_id,
            used_tools: !turn.tool_calls.is_empty(),
            answer: turn.answer,
            success: true,
        })
    }

    fn failed(&self, session_id: SessionId, error: TurnError) -> TurnOutcome {
        tracing::error!(session_id = %session_id, error = %error, "turn failed");
        TurnOutcome {
            session_id,
            answer: prompt::APOLOGY.to_string(),
            success: false,
            used_tools: false,
        }
    }

    async fn run_turn(&self, mut messages: Vec<ChatMessage>) -> Result<CompletedTurn, TurnError> {
        let catalog = self.discovery.catalog();
        let mut state = TurnState::Idle;

        advance(&mut state, TurnState::AwaitingModelDecision);
        let (content, calls) = match self.oracle.decide(&messages, &catalog.functions).await? {
            Decision::Answer(answer) => {
                advance(&mut state, TurnState::DirectAnswer);
                return Ok(CompletedTurn {
                    answer,
                    tool_calls: Vec::new(),
                    tool_results: Vec::new(),
                });
            }
            Decision::ToolCalls { content, calls } => (content, calls),
        };

        advance(&mut state, TurnState::ToolsRequested);
        messages.push(ChatMessage::Assistant {
            content,
            tool_calls: calls.clone(),
        });

        advance(&mut state, TurnState::AwaitingToolResults);
        let mut tool_results = Vec::with_capacity(calls.len());
        for call in &calls {
            if let Some(target) = catalog.endpoints.get(&call.name) {
                tracing::debug!(tool = %call.name, endpoint = %target.endpoint, "invoking tool");
            }
            let result = self.executor.call_tool(&call.name, &call.arguments).await;
            tool_results.push(ToolResultRecord {
                tool: call.name.clone(),
                arguments: call.arguments.clone(),
                result: preview(&result),
            });
            messages.push(ChatMessage::Tool {
                tool_call_id: call.id.clone(),
                content: result,
            });
        }

        advance(&mut state, TurnState::AwaitingFinalAnswer);
        match self.oracle.decide(&messages, &[]).await? {
            Decision::Answer(answer) => Ok(CompletedTurn {
                answer,
                tool_calls: calls,
                tool_results,
            }),
            Decision::ToolCalls { .. } => Err(TurnError::UnexpectedToolCalls),
        }
    }

    /// Store the user query and the answer as one batch.
    async fn persist(&self, session: SessionId, query: &str, turn: &CompletedTurn) -> Result<(), SessionLogError> {
        let user_metadata = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "query_length": query.chars().count(),
        });

        let mut assistant_metadata = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "model": self.oracle.model(),
            "had_tool_calls": !turn.tool_calls.is_empty(),
            "response_length": turn.answer.chars().count(),
        });
        if !turn.tool_calls.is_empty() {
            assistant_metadata["tool_calls"] = json!(turn.tool_calls);
            assistant_metadata["tool_results"] = json!(turn.tool_results);
        }

        let entries = vec![
            SessionEntry::new(Role::User, query, Some(user_metadata)),
            SessionEntry::new(Role::Assistant, &turn.answer, Some(assistant_metadata)),
        ];
        self.with_log(move |log| log.append_entries(session, entries)).await
    }
}

fn advance(state: &mut TurnState, next: TurnState) {
    tracing::debug!(from = ?*state, to = ?next, "turn state");
    *state = next;
}

/// First [`TOOL_RESULT_PREVIEW_CHARS`] characters of `text`.
fn preview(text: &str) -> String {
    match text.char_indices().nth(TOOL_RESULT_PREVIEW_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
