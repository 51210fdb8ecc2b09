//! Shared fakes for the integration tests: a weather backend with canned
//! data, in-process and failing RPC transports, and a scripted oracle.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use tool_gateway::agent::oracle::{
    ChatMessage, Decision, DecisionOracle, FunctionTool, OracleError,
};
use tool_gateway::client::{RpcTransport, TransportError};
use tool_gateway::handlers::{self, ToolInvoker};
use tool_gateway::protocol::{JsonRpcRequest, JsonRpcResponse};
use tool_gateway::registry::ToolRegistry;
use tool_gateway::weather::{
    Coordinates, CurrentConditions, ForecastSample, WeatherBackend, WeatherError,
};

/// Location the fake geocoder cannot resolve.
pub const UNKNOWN_PLACE: &str = "Atlantis";
/// Location that makes the fake backend panic mid-lookup.
pub const PANIC_PLACE: &str = "Panicville";
/// Location that makes the fake backend stall past any test timeout.
pub const SLOW_PLACE: &str = "Slowtown";

// 2024-03-01T00:00:00Z
const DAY0: i64 = 1_709_251_200;
const HOUR: i64 = 3_600;

pub struct FakeWeather;

#[async_trait]
impl WeatherBackend for FakeWeather {
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, WeatherError> {
        match location {
            UNKNOWN_PLACE => Ok(None),
            PANIC_PLACE => panic!("geocoder exploded"),
            SLOW_PLACE => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(None)
            }
            _ => Ok(Some(Coordinates {
                lat: 60.39,
                lon: 5.32,
            })),
        }
    }

    async fn current(&self, _coords: Coordinates) -> Result<CurrentConditions, WeatherError> {
        Ok(CurrentConditions {
            temperature: 7.6,
            feels_like: 4.4,
            humidity: 87.0,
            description: "light rain".into(),
            wind_speed: 5.1,
        })
    }

    async fn forecast(&self, _coords: Coordinates) -> Result<Vec<ForecastSample>, WeatherError> {
        let sample = |offset: i64, temperature: f64, description: &str| ForecastSample {
            timestamp: DAY0 + offset * HOUR,
            temperature,
            humidity: 80.0,
            description: description.into(),
            wind_speed: 4.0,
        };
        Ok(vec![
            sample(0, 3.0, "light rain"),
            sample(3, 6.0, "light rain"),
            sample(6, 8.0, "overcast clouds"),
            sample(24, 9.0, "clear sky"),
        ])
    }
}

pub fn invoker() -> Arc<ToolInvoker> {
    invoker_with_timeout(Duration::from_secs(5))
}

pub fn invoker_with_timeout(timeout: Duration) -> Arc<ToolInvoker> {
    Arc::new(ToolInvoker::new(
        Arc::new(ToolRegistry::builtin()),
        Arc::new(FakeWeather),
        timeout,
    ))
}

/// Send a raw JSON body through the gateway's message handler.
pub async fn call_raw(invoker: &Arc<ToolInvoker>, body: &str) -> Value {
    let response = handlers::handle_message(body.as_bytes(), invoker.clone()).await;
    serde_json::to_value(response).unwrap()
}

/// Transport that hands requests straight to an in-process gateway.
pub struct LoopbackTransport {
    invoker: Arc<ToolInvoker>,
}

impl LoopbackTransport {
    pub fn new(invoker: Arc<ToolInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl RpcTransport for LoopbackTransport {
    async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let body = serde_json::to_vec(request).unwrap();
        Ok(handlers::handle_message(&body, self.invoker.clone()).await)
    }
}

/// Transport that always fails to connect.
pub struct FailingTransport;

#[async_trait]
impl RpcTransport for FailingTransport {
    async fn send(&self, _request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        Err(TransportError::Connection("connection refused".into()))
    }
}

/// Loopback transport that can be switched to failing mid-test.
pub struct SwitchableTransport {
    inner: LoopbackTransport,
    down: AtomicBool,
}

impl SwitchableTransport {
    pub fn new(invoker: Arc<ToolInvoker>) -> Self {
        Self {
            inner: LoopbackTransport::new(invoker),
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl RpcTransport for SwitchableTransport {
    async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("gateway is down".into()));
        }
        self.inner.send(request).await
    }
}

/// One oracle call as the scripted oracle saw it.
#[derive(Debug, Clone)]
pub struct OracleCall {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<String>,
}

/// Oracle that replays queued decisions and records every call.
#[derive(Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Result<Decision, OracleError>>>,
    calls: Mutex<Vec<OracleCall>>,
}

impl ScriptedOracle {
    pub fn new(script: Vec<Result<Decision, OracleError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<OracleCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn decide(
        &self,
        messages: &[ChatMessage],
        tools: &[FunctionTool],
    ) -> Result<Decision, OracleError> {
        self.calls.lock().push(OracleCall {
            messages: messages.to_vec(),
            tools: tools.iter().map(|t| t.name().to_string()).collect(),
        });
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Transport("script exhausted".into())))
    }
}
