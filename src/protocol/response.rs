use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::request::{RpcId, JSONRPC_VERSION};

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 response layer
// ---------------------------------------------------------------------------

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Methods the dispatcher routes. Reported back in `-32601` diagnostics.
pub const SUPPORTED_METHODS: &[&str] = &["tools/list", "tools/call"];

/// JSON-RPC 2.0 response envelope.
///
/// Build it through [`JsonRpcResponse::success`] or [`JsonRpcResponse::error`]
/// so exactly one of `result`/`error` is set. `id` is always serialized,
/// as `null` when the request carried none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<RpcId>,
    /// `Some(Value::Null)` for `"result": null`; `None` only when the key
    /// is absent.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcResponse {
    pub fn success(id: Option<RpcId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RpcId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// True when exactly one of `result` / `error` is present.
    pub fn is_well_formed(&self) -> bool {
        self.result.is_some() != self.error.is_some()
    }
}

/// JSON-RPC 2.0 error object (protocol-level errors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn with_data(code: i32, message: &str, data: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(Value::String(data.into())),
        }
    }

    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::with_data(PARSE_ERROR, "Parse error", detail)
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::with_data(INVALID_REQUEST, "Invalid Request", detail)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::with_data(
            METHOD_NOT_FOUND,
            "Method not found",
            format!(
                "Unknown method: {method}. Supported: {}",
                SUPPORTED_METHODS.join(", ")
            ),
        )
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::with_data(INVALID_PARAMS, "Invalid params", detail)
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::with_data(INTERNAL_ERROR, "Internal error", detail)
    }
}

// ---------------------------------------------------------------------------
// Tool result layer (returned inside a *successful* JSON-RPC response)
// ---------------------------------------------------------------------------

/// Tool call result wrapper.
///
/// Business faults travel here with `is_error = true` and never carry
/// `structured_content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub content: Vec<ToolResultContent>,
    #[serde(
        rename = "structuredContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

/// A single content block inside a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

impl ToolResultContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".into(),
            text: text.into(),
        }
    }
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::text(text)],
            structured_content: None,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::text(text)],
            structured_content: None,
            is_error: true,
        }
    }

    /// Success carrying `value` both as structured data and as its
    /// pretty-printed rendering.
    pub fn structured(value: Value) -> Result<Self, serde_json::Error> {
        let rendered = serde_json::to_string_pretty(&value)?;
        Ok(Self {
            content: vec![ToolResultContent::text(rendered)],
            structured_content: Some(value),
            is_error: false,
        })
    }

    /// First `text`-typed content block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_result_is_distinct_from_absent_result() {
        let null: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert_eq!(null.result, Some(Value::Null));
        assert!(null.is_well_formed());

        let absent: JsonRpcResponse = serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1})).unwrap();
        assert_eq!(absent.result, None);
        assert!(!absent.is_well_formed());

        let error: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "Method not found"}
        }))
        .unwrap();
        assert!(error.result.is_none() && error.is_well_formed());
    }
}
