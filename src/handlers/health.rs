use serde::Serialize;

pub const SERVICE_NAME: &str = "Tool Gateway";

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// Informational liveness payload for `GET /health`.
pub fn handle() -> HealthResponse {
    HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}
