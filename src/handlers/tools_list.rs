use serde_json::Value;

use crate::protocol::{JsonRpcError, ToolsListResult};
use crate::registry::ToolRegistry;

/// Handle `tools/list`: the registry's catalog wrapped as `{tools: [...]}`.
pub fn handle(registry: &ToolRegistry) -> Result<Value, JsonRpcError> {
    let result = ToolsListResult {
        tools: registry.list_tools(),
    };
    serde_json::to_value(&result).map_err(|e| {
        tracing::error!(error = %e, "tool catalog serialization failed");
        JsonRpcError::internal_error(e.to_string())
    })
}
