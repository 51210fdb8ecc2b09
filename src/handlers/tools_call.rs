use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::protocol::ToolResult;
use crate::registry::{ToolHandler, ToolRegistry};
use crate::schema::missing_required;
use crate::weather::{self, WeatherBackend};

/// Runs registered tools and folds every outcome into a [`ToolResult`].
///
/// Unknown tools, missing arguments and upstream failures are business
/// faults (`isError: true`); nothing here produces a protocol error.
#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    weather: Arc<dyn WeatherBackend>,
    tool_timeout: Duration,
}

impl ToolInvoker {
    pub fn new(
        registry: Arc<ToolRegistry>,
        weather: Arc<dyn WeatherBackend>,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            weather,
            tool_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn invoke(&self, name: &str, arguments: &Map<String, Value>) -> ToolResult {
        let Some(tool) = self.registry.get(name) else {
            tracing::warn!(tool = name, "call for unknown tool");
            return ToolResult::error(format!("Unknown tool: {name}"));
        };

        if let Some(field) = missing_required(&tool.descriptor.input_schema, arguments) {
            tracing::warn!(tool = name, field, "tool call missing required argument");
            return ToolResult::error(format!("Missing required parameter: '{field}'"));
        }

        match tool.handler {
            ToolHandler::WeatherForecast => self.weather_forecast(arguments).await,
        }
    }

    async fn weather_forecast(&self, arguments: &Map<String, Value>) -> ToolResult {
        let Some(location) = arguments.get("location").and_then(Value::as_str) else {
            return ToolResult::error("Parameter 'location' must be a string");
        };

        tracing::info!(location, "fetching weather forecast");
        let report = match weather::lookup_forecast(self.weather.as_ref(), location, self.tool_timeout).await {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(location, error = %err, "weather lookup failed");
                return err.into();
            }
        };

        match serde_json::to_value(&report).and_then(ToolResult::structured) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "weather report serialization failed");
                ToolResult::error("Could not encode the weather report")
            }
        }
    }
}
