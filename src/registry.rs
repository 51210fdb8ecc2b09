//! Static catalog of callable tools.
//!
//! Every tool pairs its published [`ToolDescriptor`] with a [`ToolHandler`]
//! variant. The set is fixed when the registry is built; adding a tool means
//! adding a descriptor here and a handler arm in the invoker.

use std::collections::HashSet;

use serde_json::json;

use crate::protocol::ToolDescriptor;

pub const WEATHER_FORECAST_TOOL: &str = "get_weather_forecast";

/// Closed set of operations the invoker knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolHandler {
    WeatherForecast,
}

#[derive(Debug, Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub handler: ToolHandler,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("duplicate tool name: {0}")]
pub struct DuplicateTool(pub String);

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Registry with no tools. Valid; `tools/list` returns an empty array.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The tools this gateway ships with.
    pub fn builtin() -> Self {
        Self {
            tools: vec![RegisteredTool {
                descriptor: weather_forecast_descriptor(),
                handler: ToolHandler::WeatherForecast,
            }],
        }
    }

    /// Build from an explicit list, rejecting duplicate names.
    pub fn with_tools(tools: Vec<RegisteredTool>) -> Result<Self, DuplicateTool> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.descriptor.name.as_str()) {
                return Err(DuplicateTool(tool.descriptor.name.clone()));
            }
        }
        Ok(Self { tools })
    }

    /// Published descriptors, in registration order.
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.descriptor.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

pub fn weather_forecast_descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: WEATHER_FORECAST_TOOL.into(),
        title: Some("Weather Forecast Provider".into()),
        description: "Get the weather forecast for a destination, with current conditions \
                      and a 5-day outlook"
            .into(),
        input_schema: json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "Name of a city or place (e.g. 'Oslo', 'Bergen', 'New York')"
                }
            },
            "required": ["location"],
            "additionalProperties": false
        }),
        output_schema: Some(json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": {
                "location": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "coordinates": {
                            "type": "array",
                            "items": {"type": "number"}
                        }
                    }
                },
                "current": {
                    "type": "object",
                    "properties": {
                        "temperature": {"type": "number"},
                        "feels_like": {"type": "number"},
                        "humidity": {"type": "number"},
                        "description": {"type": "string"},
                        "wind_speed": {"type": "number"},
                        "timestamp": {"type": "string"}
                    }
                },
                "forecast": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "date": {"type": "string"},
                            "temp_min": {"type": "number"},
                            "temp_max": {"type": "number"},
                            "description": {"type": "string"},
                            "humidity": {"type": "number"},
                            "wind_speed": {"type": "number"}
                        }
                    }
                }
            },
            "required": ["location", "current", "forecast"]
        })),
        invocation_hints: None,
    }
}
