use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A callable capability as advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(
        rename = "outputSchema",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub output_schema: Option<Value>,
    #[serde(
        rename = "invocationHints",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub invocation_hints: Option<InvocationHints>,
}

impl ToolDescriptor {
    /// Argument names listed under the input schema's `required` array.
    pub fn required_arguments(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Transport metadata a dispatcher may attach to a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationHints {
    pub endpoint: String,
    #[serde(default = "default_hint_method")]
    pub method: String,
}

fn default_hint_method() -> String {
    "POST".into()
}

/// `tools/list` result body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDescriptor>,
}
