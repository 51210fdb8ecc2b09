//! End-to-end tests over real sockets: the gateway and agent routers served
//! on ephemeral ports and driven with reqwest.

mod support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use support::{invoker, LoopbackTransport, ScriptedOracle};
use tool_gateway::agent::oracle::Decision;
use tool_gateway::agent::server::{self as agent_server, AgentContext, QueryResponse};
use tool_gateway::agent::session::MemorySessionLog;
use tool_gateway::agent::Agent;
use tool_gateway::client::{RpcClient, ToolDiscovery};
use tool_gateway::compliance;
use tool_gateway::server::{self, HttpServer};

fn any_port() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

async fn start_gateway() -> HttpServer {
    HttpServer::start(any_port(), server::router(invoker())).await.unwrap()
}

async fn start_agent(ctx: AgentContext) -> HttpServer {
    HttpServer::start(any_port(), agent_server::router(Arc::new(ctx))).await.unwrap()
}

fn url(server: &HttpServer, path: &str) -> String {
    format!("http://{}{path}", server.addr())
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[tokio::test]
async fn gateway_passes_compliance_checks() {
    let gateway = start_gateway().await;
    let client = RpcClient::http(&url(&gateway, ""), Duration::from_secs(5)).unwrap();

    let report = compliance::run(&client).await;
    let failures: Vec<_> = report.failures().collect();
    assert!(report.passed(), "compliance failures: {failures:?}");
    assert_eq!(report.checks.len(), 7);

    gateway.shutdown().await;
}

#[tokio::test]
async fn protocol_errors_travel_with_http_200() {
    let gateway = start_gateway().await;
    let http = reqwest::Client::new();

    let resp = http
        .post(url(&gateway, "/message"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
    assert_eq!(body["id"], Value::Null);

    let resp = http
        .post(url(&gateway, "/message"))
        .json(&json!({"jsonrpc": "2.0", "id": "x", "method": "nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(body["id"], "x");

    gateway.shutdown().await;
}

#[tokio::test]
async fn oversized_message_is_rejected_by_transport() {
    let gateway = start_gateway().await;
    let huge = format!(
        r#"{{"jsonrpc":"2.0","id":1,"method":"tools/list","params":"{}"}}"#,
        "x".repeat(1024 * 1024 + 1024)
    );
    let resp = reqwest::Client::new()
        .post(url(&gateway, "/message"))
        .body(huge)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    gateway.shutdown().await;
}

#[tokio::test]
async fn gateway_health_reports_service() {
    let gateway = start_gateway().await;
    let body: Value = reqwest::get(url(&gateway, "/health")).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Tool Gateway");
    assert!(body["timestamp"].is_string());
    gateway.shutdown().await;
}

#[tokio::test]
async fn discovery_over_http() {
    let gateway = start_gateway().await;
    let client = Arc::new(RpcClient::http(&url(&gateway, ""), Duration::from_secs(5)).unwrap());
    let discovery = ToolDiscovery::new(client);
    assert!(discovery.discover().await);
    assert_eq!(discovery.catalog().len(), 1);
    gateway.shutdown().await;
}

#[tokio::test]
async fn unreachable_gateway_is_a_transport_fault() {
    // Bind and immediately release a port so nothing listens on it.
    let addr = {
        let listener = std::net::TcpListener::bind(any_port()).unwrap();
        listener.local_addr().unwrap()
    };
    let client = RpcClient::http(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let discovery = ToolDiscovery::new(Arc::new(client));
    assert!(!discovery.discover().await);
    assert!(discovery.catalog().is_empty());
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

async fn ready_agent(script: Vec<Decision>) -> AgentContext {
    let oracle = Arc::new(ScriptedOracle::new(script.into_iter().map(Ok).collect()));
    let client = Arc::new(RpcClient::new(Arc::new(LoopbackTransport::new(invoker()))));
    let agent = Agent::new(oracle, client, Arc::new(MemorySessionLog::new()));
    agent.discover_tools().await;
    AgentContext::ready(Arc::new(agent))
}

#[tokio::test]
async fn agent_answers_queries_in_default_session() {
    let agent = start_agent(
        ready_agent(vec![
            Decision::Answer("Hello!".into()),
            Decision::Answer("Still here.".into()),
        ])
        .await,
    )
    .await;
    let http = reqwest::Client::new();

    let first: QueryResponse = http
        .post(url(&agent, "/query"))
        .json(&json!({"query": "Hi"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(first.success);
    assert_eq!(first.response, "Hello!");

    let second: QueryResponse = http
        .post(url(&agent, "/query"))
        .json(&json!({"query": "Again", "session_id": first.session_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.response, "Still here.");

    agent.shutdown().await;
}

#[tokio::test]
async fn agent_rejects_bad_queries() {
    let agent = start_agent(ready_agent(vec![]).await).await;
    let http = reqwest::Client::new();

    let empty = http
        .post(url(&agent, "/query"))
        .json(&json!({"query": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), 400);

    for session_id in [uuid::Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let unknown = http
            .post(url(&agent, "/query"))
            .json(&json!({"query": "Hi", "session_id": session_id}))
            .send()
            .await
            .unwrap();
        assert_eq!(unknown.status(), 404);
        let body: Value = unknown.json().await.unwrap();
        assert_eq!(body["success"], false);
    }

    agent.shutdown().await;
}

#[tokio::test]
async fn malformed_query_bodies_get_json_errors() {
    let agent = start_agent(ready_agent(vec![]).await).await;
    let http = reqwest::Client::new();

    let missing_query = http
        .post(url(&agent, "/query"))
        .json(&json!({"session_id": null}))
        .send()
        .await
        .unwrap();
    let undecodable = http
        .post(url(&agent, "/query"))
        .header("content-type", "application/json")
        .body("{\"query\": ")
        .send()
        .await
        .unwrap();
    let no_content_type = http.post(url(&agent, "/query")).body(r#"{"query": "Hi"}"#).send().await.unwrap();

    for resp in [missing_query, undecodable] {
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }
    // The body is read as JSON whatever its declared type.
    assert_eq!(no_content_type.status(), 200);

    agent.shutdown().await;
}

#[tokio::test]
async fn failed_turn_returns_apology_with_success_false() {
    // Empty script: the oracle fails on first use.
    let agent = start_agent(ready_agent(vec![]).await).await;
    let resp = reqwest::Client::new()
        .post(url(&agent, "/query"))
        .json(&json!({"query": "Weather in Oslo?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: QueryResponse = resp.json().await.unwrap();
    assert!(!body.success);
    assert_eq!(body.response, tool_gateway::agent::prompt::APOLOGY);
    agent.shutdown().await;
}

#[tokio::test]
async fn agent_sessions_can_be_created_explicitly() {
    let agent = start_agent(ready_agent(vec![Decision::Answer("ok".into())]).await).await;
    let http = reqwest::Client::new();

    let created = http
        .post(url(&agent, "/sessions"))
        .json(&json!({"name": "Trip planning"}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let created: Value = created.json().await.unwrap();
    let session_id = created["session_id"].as_str().unwrap().to_string();

    let answer: QueryResponse = http
        .post(url(&agent, "/query"))
        .json(&json!({"query": "Hi", "session_id": session_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(answer.success);
    assert_eq!(answer.session_id, session_id);

    let unnamed = http.post(url(&agent, "/sessions")).send().await.unwrap();
    assert_eq!(unnamed.status(), 201);

    let garbled = http
        .post(url(&agent, "/sessions"))
        .body("{name")
        .send()
        .await
        .unwrap();
    assert_eq!(garbled.status(), 400);

    agent.shutdown().await;
}

#[tokio::test]
async fn unavailable_agent_reports_not_ready() {
    let agent = start_agent(AgentContext::unavailable()).await;
    let http = reqwest::Client::new();

    let health: Value = http.get(url(&agent, "/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["agent_ready"], false);
    assert_eq!(health["tools"], 0);

    let resp = http
        .post(url(&agent, "/query"))
        .json(&json!({"query": "Hi"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);

    agent.shutdown().await;
}

#[tokio::test]
async fn ready_agent_health_counts_tools() {
    let agent = start_agent(ready_agent(vec![]).await).await;
    let health: Value = reqwest::get(url(&agent, "/health")).await.unwrap().json().await.unwrap();
    assert_eq!(health["agent_ready"], true);
    assert_eq!(health["tools"], 1);
    agent.shutdown().await;
}
