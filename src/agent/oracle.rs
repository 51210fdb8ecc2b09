//! The decision oracle: a chat model that either answers or asks for tools.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::ToolDescriptor;

/// A tool in the function-calling shape chat models expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FunctionTool {
    /// The input schema is passed through unchanged as `parameters`.
    pub fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        Self {
            kind: "function".into(),
            function: FunctionSpec {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                parameters: descriptor.input_schema.clone(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// One tool invocation requested by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolInvocation>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl ChatMessage {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// What the oracle decided for the current conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Answer(String),
    /// `calls` is never empty; an empty request is reported as an answer.
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolInvocation>,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("model endpoint unreachable: {0}")]
    Transport(String),
    #[error("model endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed model response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait DecisionOracle: Send + Sync {
    /// Model identifier recorded in turn metadata.
    fn model(&self) -> &str;

    /// Decide on the next step. An empty `tools` slice means no tools are on
    /// offer and the oracle must answer in text.
    async fn decide(
        &self,
        messages: &[ChatMessage],
        tools: &[FunctionTool],
    ) -> Result<Decision, OracleError>;
}
