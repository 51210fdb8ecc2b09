use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The only protocol version tag this crate speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 ID, a number or a string. A `null` or absent
/// id is represented as `None` on the owning envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(serde_json::Number),
    Str(String),
}

impl From<u64> for RpcId {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i64> for RpcId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for RpcId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

/// JSON-RPC 2.0 request envelope.
///
/// `jsonrpc` and `method` are optional at the type level so that a request
/// missing either can still be answered with `-32600` and its id echoed,
/// instead of being rejected as unparseable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<RpcId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RpcId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.into()),
            id: Some(id.into()),
            method: Some(method.into()),
            params,
        }
    }

    pub fn tools_list(id: impl Into<RpcId>) -> Self {
        Self::new(id, "tools/list", None)
    }

    pub fn tools_call(id: impl Into<RpcId>, params: &ToolCallParams) -> Self {
        let params = serde_json::json!({
            "name": params.name,
            "arguments": params.arguments,
        });
        Self::new(id, "tools/call", Some(params))
    }
}

/// Parameters for `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallParams {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}
