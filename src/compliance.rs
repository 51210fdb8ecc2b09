//! Black-box protocol checks against a running gateway.
//!
//! Each check sends real JSON-RPC traffic through an [`RpcClient`] and
//! records whether the gateway answered in the expected tier with the
//! expected shape.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::client::{RpcClient, RpcOutcome};
use crate::protocol::{
    JsonRpcRequest, RpcId, ToolCallParams, ToolDescriptor, ToolResult, ToolsListResult,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};

/// City used when a check needs a plausible value for a required string.
const SAMPLE_STRING: &str = "Oslo";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplianceReport {
    pub checks: Vec<CheckResult>,
}

impl ComplianceReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Run every check in order. Later checks still run when earlier ones fail.
pub async fn run(client: &RpcClient) -> ComplianceReport {
    let mut report = ComplianceReport::default();

    let (listed, tools) = check_tools_list(client).await;
    report.checks.push(listed);
    report.checks.push(check_first_tool_call(client, tools.first()).await);
    report.checks.push(check_unknown_tool(client).await);
    report.checks.push(check_unknown_method(client).await);
    report.checks.push(check_missing_params(client).await);
    report.checks.push(check_string_id_echo(client).await);
    report.checks.push(check_bad_version(client).await);

    for check in &report.checks {
        if check.passed {
            tracing::info!(check = check.name, detail = %check.detail, "check passed");
        } else {
            tracing::error!(check = check.name, detail = %check.detail, "check failed");
        }
    }
    report
}

async fn check_tools_list(client: &RpcClient) -> (CheckResult, Vec<ToolDescriptor>) {
    const NAME: &str = "tools_list";

    let result = match client.call("tools/list", None).await {
        RpcOutcome::Success(result) => result,
        other => return (CheckResult::fail(NAME, describe(&other)), Vec::new()),
    };
    let list: ToolsListResult = match serde_json::from_value(result) {
        Ok(list) => list,
        Err(e) => return (CheckResult::fail(NAME, format!("malformed tool list: {e}")), Vec::new()),
    };

    if list.tools.is_empty() {
        return (CheckResult::fail(NAME, "gateway lists no tools"), list.tools);
    }
    let mut names: Vec<&str> = list.tools.iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
        let detail = format!("duplicate tool name: {}", pair[0]);
        return (CheckResult::fail(NAME, detail), list.tools);
    }

    let detail = format!("{} tool(s): {}", names.len(), names.join(", "));
    (CheckResult::pass(NAME, detail), list.tools)
}

async fn check_first_tool_call(client: &RpcClient, tool: Option<&ToolDescriptor>) -> CheckResult {
    const NAME: &str = "tools_call_with_required_arguments";

    let Some(tool) = tool else {
        return CheckResult::fail(NAME, "no tool available to call");
    };
    let arguments = sample_arguments(tool);
    let request = JsonRpcRequest::tools_call(client.next_id(), &ToolCallParams::new(&tool.name, arguments));

    let result = match tool_result(client.send(&request).await) {
        Ok(result) => result,
        Err(detail) => return CheckResult::fail(NAME, detail),
    };
    let text = result.first_text().unwrap_or_default();
    if result.is_error && text.starts_with("Missing required parameter") {
        return CheckResult::fail(NAME, format!("required arguments rejected: {text}"));
    }

    // A business fault (e.g. no upstream API key) still proves the call was
    // dispatched and answered in the right tier.
    if result.is_error {
        CheckResult::pass(NAME, format!("{} answered with a business fault: {text}", tool.name))
    } else {
        CheckResult::pass(NAME, format!("{} succeeded", tool.name))
    }
}

async fn check_unknown_tool(client: &RpcClient) -> CheckResult {
    const NAME: &str = "unknown_tool_is_business_fault";

    let params = ToolCallParams::new("compliance_no_such_tool", Map::new());
    let request = JsonRpcRequest::tools_call(client.next_id(), &params);
    match tool_result(client.send(&request).await) {
        Ok(result) if result.is_error => {
            CheckResult::pass(NAME, result.first_text().unwrap_or_default().to_string())
        }
        Ok(_) => CheckResult::fail(NAME, "unknown tool did not set isError"),
        Err(detail) => CheckResult::fail(NAME, detail),
    }
}

async fn check_unknown_method(client: &RpcClient) -> CheckResult {
    expect_code(
        "unknown_method",
        client.call("resources/list", None).await,
        METHOD_NOT_FOUND,
    )
}

async fn check_missing_params(client: &RpcClient) -> CheckResult {
    expect_code(
        "tools_call_without_params",
        client.call("tools/call", None).await,
        INVALID_PARAMS,
    )
}

async fn check_string_id_echo(client: &RpcClient) -> CheckResult {
    const NAME: &str = "string_id_echo";

    // The client rejects any reply whose id differs, so success implies echo.
    let request = JsonRpcRequest::tools_list(RpcId::from("compliance-string-id"));
    match client.send(&request).await {
        RpcOutcome::Success(_) => CheckResult::pass(NAME, "string id echoed"),
        other => CheckResult::fail(NAME, describe(&other)),
    }
}

async fn check_bad_version(client: &RpcClient) -> CheckResult {
    let mut request = JsonRpcRequest::tools_list(client.next_id());
    request.jsonrpc = Some("1.0".into());
    expect_code("wrong_jsonrpc_version", client.send(&request).await, INVALID_REQUEST)
}

fn expect_code(name: &'static str, outcome: RpcOutcome, code: i32) -> CheckResult {
    match outcome {
        RpcOutcome::Protocol(err) if err.code == code => {
            CheckResult::pass(name, format!("{}: {}", err.code, err.message))
        }
        other => CheckResult::fail(name, format!("expected error {code}, got {}", describe(&other))),
    }
}

fn tool_result(outcome: RpcOutcome) -> Result<ToolResult, String> {
    match outcome {
        RpcOutcome::Success(value) => {
            serde_json::from_value(value).map_err(|e| format!("result is not a tool result: {e}"))
        }
        other => Err(describe(&other)),
    }
}

fn describe(outcome: &RpcOutcome) -> String {
    match outcome {
        RpcOutcome::Transport(e) => format!("transport fault: {e}"),
        RpcOutcome::Protocol(e) => format!("protocol error {}: {}", e.code, e.message),
        RpcOutcome::Success(v) => format!("success: {v}"),
    }
}

/// Plausible values for every required argument, by declared type.
fn sample_arguments(tool: &ToolDescriptor) -> Map<String, Value> {
    let properties = tool.input_schema.get("properties");
    tool.required_arguments()
        .into_iter()
        .map(|field| {
            let kind = properties
                .and_then(|p| p.get(field))
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("string");
            let value = match kind {
                "integer" | "number" => json!(1),
                "boolean" => json!(true),
                "array" => json!([]),
                "object" => json!({}),
                _ => json!(SAMPLE_STRING),
            };
            (field.to_string(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::weather_forecast_descriptor;

    #[test]
    fn sample_arguments_fill_required_strings() {
        let args = sample_arguments(&weather_forecast_descriptor());
        assert_eq!(args.len(), 1);
        assert_eq!(args["location"], SAMPLE_STRING);
    }

    #[test]
    fn report_fails_when_any_check_fails() {
        let mut report = ComplianceReport::default();
        report.checks.push(CheckResult::pass("a", "ok"));
        assert!(report.passed());
        report.checks.push(CheckResult::fail("b", "nope"));
        assert!(!report.passed());
        assert_eq!(report.failures().count(), 1);
    }
}
