//! Golden test: the published tool catalog is part of the wire contract.

mod support;

use serde_json::Value;

use support::{call_raw, invoker};

fn expected() -> Value {
    serde_json::from_str(include_str!("golden/tools_list.json")).expect("golden file is valid JSON")
}

#[tokio::test]
async fn tools_list_matches_golden_catalog() {
    let inv = invoker();
    let resp = call_raw(&inv, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
    assert_eq!(resp["result"], expected(), "tools/list drifted from tests/golden/tools_list.json");
}

#[tokio::test]
async fn tools_list_is_stable_across_calls() {
    let inv = invoker();
    let first = call_raw(&inv, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
    let second = call_raw(&inv, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap(),
        "tools/list must be byte-identical across calls"
    );
}
