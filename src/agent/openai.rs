//! OpenAI-compatible Chat Completions oracle.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::oracle::{ChatMessage, Decision, DecisionOracle, FunctionTool, OracleError, ToolInvocation};

/// Model-call timeout; chat completions can be slow, so this is generous.
const MODEL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct OpenAiOracle {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiOracle {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .timeout(MODEL_TIMEOUT)
            .build()
            .map_err(|e| OracleError::Transport(format!("failed to create HTTP client: {e}")))?;
        let base_url: String = base_url.into();
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl DecisionOracle for OpenAiOracle {
    fn model(&self) -> &str {
        &self.model
    }

    async fn decide(
        &self,
        messages: &[ChatMessage],
        tools: &[FunctionTool],
    ) -> Result<Decision, OracleError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest::new(&self.model, messages, tools);

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        parsed.into_decision()
    }
}

// --- Chat Completions API Types ---

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [FunctionTool]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

impl<'a> ChatRequest<'a> {
    fn new(model: &'a str, messages: &[ChatMessage], tools: &'a [FunctionTool]) -> Self {
        let offer_tools = !tools.is_empty();
        Self {
            model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: offer_tools.then_some(tools),
            tool_choice: offer_tools.then_some("auto"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    tool_type: String,
    function: WireFunctionCall,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object, as the API transmits it.
    arguments: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let plain = |role: &str, content: &str| WireMessage {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        };

        match message {
            ChatMessage::System(content) => plain("system", content.as_str()),
            ChatMessage::User(content) => plain("user", content.as_str()),
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => WireMessage {
                role: "assistant".into(),
                content: content.clone(),
                tool_calls: (!tool_calls.is_empty()).then(|| {
                    tool_calls
                        .iter()
                        .map(|call| WireToolCall {
                            id: call.id.clone(),
                            tool_type: function_type(),
                            function: WireFunctionCall {
                                name: call.name.clone(),
                                arguments: Value::Object(call.arguments.clone()).to_string(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: None,
            },
            ChatMessage::Tool {
                tool_call_id,
                content,
            } => WireMessage {
                role: "tool".into(),
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(tool_call_id.clone()),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

impl ChatResponse {
    fn into_decision(self) -> Result<Decision, OracleError> {
        let message = self
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| OracleError::Malformed("response has no choices".into()))?;

        let calls = message.tool_calls.unwrap_or_default();
        if calls.is_empty() {
            return message
                .content
                .map(Decision::Answer)
                .ok_or_else(|| OracleError::Malformed("response has neither content nor tool calls".into()));
        }

        let calls = calls
            .into_iter()
            .map(|call| {
                let arguments = parse_arguments(&call.function.arguments).map_err(|reason| {
                    OracleError::Malformed(format!(
                        "arguments for tool call {} ({}) {reason}",
                        call.id, call.function.name
                    ))
                })?;
                Ok(ToolInvocation {
                    id: call.id,
                    name: call.function.name,
                    arguments,
                })
            })
            .collect::<Result<Vec<_>, OracleError>>()?;

        Ok(Decision::ToolCalls {
            content: message.content,
            calls,
        })
    }
}

fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("are not a JSON object".into()),
        Err(e) => Err(format!("are not valid JSON: {e}")),
    }
}
