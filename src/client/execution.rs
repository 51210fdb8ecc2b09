use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{RpcClient, RpcOutcome, TransportError};
use crate::protocol::{JsonRpcError, JsonRpcRequest, ToolCallParams, ToolResult};

/// Result of one `tools/call`, tagged by the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCallOutcome {
    Transport(TransportError),
    Protocol(JsonRpcError),
    /// `isError: true` inside a successful result; carries the first text block.
    Business(String),
    Success(ToolResult),
}

impl ToolCallOutcome {
    /// Collapse any tier into the single string shape handed to the oracle.
    ///
    /// Faults become `{"error": ...}`. Success prefers `structuredContent`,
    /// then the first text block verbatim, then `{}`.
    pub fn render(&self) -> String {
        match self {
            Self::Transport(e) => error_json(e.to_string()),
            Self::Protocol(e) => error_json(format!("{}: {}", e.code, e.message)),
            Self::Business(text) => error_json(text.clone()),
            Self::Success(result) => {
                if let Some(structured) = &result.structured_content {
                    return structured.to_string();
                }
                match result.first_text() {
                    Some(text) => text.to_string(),
                    None => "{}".to_string(),
                }
            }
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Success(_))
    }
}

fn error_json(message: String) -> String {
    json!({ "error": message }).to_string()
}

/// Executes oracle-requested tool calls against the gateway.
pub struct ToolExecutor {
    client: Arc<RpcClient>,
}

impl ToolExecutor {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    /// Call `name` and return the oracle-facing string. Never fails.
    pub async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> String {
        self.call_tool_outcome(name, arguments).await.render()
    }

    pub async fn call_tool_outcome(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> ToolCallOutcome {
        tracing::info!(tool = name, "calling tool");
        let params = ToolCallParams::new(name, arguments.clone());
        let request = JsonRpcRequest::tools_call(self.client.next_id(), &params);

        let result = match self.client.send(&request).await {
            RpcOutcome::Success(result) => result,
            RpcOutcome::Protocol(err) => return ToolCallOutcome::Protocol(err),
            RpcOutcome::Transport(err) => return ToolCallOutcome::Transport(err),
        };

        let tool_result: ToolResult = match serde_json::from_value(result) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(tool = name, error = %e, "tools/call result is not a tool result");
                return ToolCallOutcome::Transport(TransportError::InvalidResponse(format!(
                    "tools/call result is not a tool result: {e}"
                )));
            }
        };

        if tool_result.is_error {
            let text = tool_result.first_text().unwrap_or_default().to_string();
            tracing::warn!(tool = name, error = %text, "tool reported an error");
            return ToolCallOutcome::Business(text);
        }

        ToolCallOutcome::Success(tool_result)
    }
}
