pub mod health;
pub mod tools_call;
pub mod tools_list;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, JSONRPC_VERSION};

pub use tools_call::ToolInvoker;

/// Decode a raw HTTP body and dispatch it.
///
/// Always yields a response: undecodable bodies get `-32700`, envelopes
/// that are not request objects get `-32600`, and a panic inside a handler
/// becomes `-32603` with the request id still echoed.
pub async fn handle_message(body: &[u8], invoker: Arc<ToolInvoker>) -> JsonRpcResponse {
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable JSON-RPC body");
            return JsonRpcResponse::error(None, JsonRpcError::parse_error(e.to_string()));
        }
    };

    let req = match decode_request(value) {
        Ok(req) => req,
        Err((id, err)) => return JsonRpcResponse::error(id, err),
    };

    let id = req.id.clone();
    let task = tokio::spawn(async move { dispatch(&req, &invoker).await });
    match task.await {
        Ok(resp) => resp,
        Err(join_err) => {
            tracing::error!(error = %join_err, "JSON-RPC handler failed");
            JsonRpcResponse::error(id, JsonRpcError::internal_error(join_err.to_string()))
        }
    }
}

fn decode_request(value: Value) -> Result<JsonRpcRequest, (Option<RpcId>, JsonRpcError)> {
    if !value.is_object() {
        return Err((None, JsonRpcError::invalid_request("Request must be a JSON object")));
    }

    // Salvage the id first so a malformed envelope still echoes it.
    let id = value
        .get("id")
        .and_then(|id| serde_json::from_value::<RpcId>(id.clone()).ok());

    serde_json::from_value(value).map_err(|e| {
        tracing::warn!(error = %e, "malformed JSON-RPC envelope");
        (id, JsonRpcError::invalid_request(e.to_string()))
    })
}

/// Dispatch a JSON-RPC request to the appropriate handler.
pub async fn dispatch(req: &JsonRpcRequest, invoker: &ToolInvoker) -> JsonRpcResponse {
    let id = req.id.clone();

    if req.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
        return JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_request("Only JSON-RPC 2.0 is supported"),
        );
    }

    let Some(method) = req.method.as_deref() else {
        return JsonRpcResponse::error(id, JsonRpcError::invalid_request("Missing method"));
    };

    tracing::debug!(method, id = ?id, "dispatching JSON-RPC request");

    let outcome = match method {
        "tools/list" => tools_list::handle(invoker.registry()),

        "tools/call" => match tool_call_params(req.params.as_ref()) {
            Ok((name, arguments)) => {
                let tool_result = invoker.invoke(name, &arguments).await;
                serde_json::to_value(&tool_result)
                    .map_err(|e| JsonRpcError::internal_error(e.to_string()))
            }
            Err(err) => Err(err),
        },

        _ => {
            tracing::warn!(method, "method not found");
            Err(JsonRpcError::method_not_found(method))
        }
    };

    match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(err) => JsonRpcResponse::error(id, err),
    }
}

/// Extract `(name, arguments)` from `tools/call` params.
///
/// Absent params, a missing or empty name, or non-object arguments are
/// protocol faults; they never reach the invoker.
fn tool_call_params(params: Option<&Value>) -> Result<(&str, Map<String, Value>), JsonRpcError> {
    let Some(params) = params.and_then(Value::as_object) else {
        return Err(JsonRpcError::invalid_params(
            "tools/call requires params with 'name' and 'arguments'",
        ));
    };

    let name = match params.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name,
        _ => {
            return Err(JsonRpcError::invalid_params(
                "Missing required parameter: 'name'",
            ))
        }
    };

    let arguments = match params.get("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(JsonRpcError::invalid_params(
                "Parameter 'arguments' must be an object",
            ))
        }
    };

    Ok((name, arguments))
}
