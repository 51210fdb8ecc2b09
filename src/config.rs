use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for tool operations and outbound RPC calls (30 seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_GATEWAY_BIND: &str = "0.0.0.0:8000";
const DEFAULT_AGENT_BIND: &str = "0.0.0.0:8001";
const DEFAULT_WEATHER_API_BASE: &str = "https://api.openweathermap.org/data/2.5";
const DEFAULT_GEOCODER_API_BASE: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_MCP_SERVER_URL: &str = "http://mcp-server:8000";
const DEFAULT_OPENAI_BASE_URL: &str = "https://models.github.ai/inference";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Gateway (serving side) configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    pub weather: WeatherConfig,
    pub tool_timeout: Duration,
}

/// Upstream endpoints for the weather tool.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub weather_api_base: String,
    pub geocoder_api_base: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            weather_api_base: DEFAULT_WEATHER_API_BASE.into(),
            geocoder_api_base: DEFAULT_GEOCODER_API_BASE.into(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment.
    ///
    /// - `GATEWAY_BIND` (optional, default `0.0.0.0:8000`)
    /// - `OPENWEATHER_API_KEY` (optional): without it the weather tool reports a business fault
    /// - `OPENWEATHER_API_BASE`, `GEOCODER_API_BASE` (optional): upstream base URLs
    /// - `GATEWAY_TOOL_TIMEOUT_SECS` (optional, default 30): max seconds per tool operation
    pub fn from_env() -> Result<Self, String> {
        let api_key = env_opt("OPENWEATHER_API_KEY");
        if api_key.is_none() {
            tracing::warn!("OPENWEATHER_API_KEY is not set; weather lookups will fail");
        }

        Ok(Self {
            bind: parse_bind("GATEWAY_BIND", DEFAULT_GATEWAY_BIND)?,
            weather: WeatherConfig {
                api_key,
                weather_api_base: env_or("OPENWEATHER_API_BASE", DEFAULT_WEATHER_API_BASE),
                geocoder_api_base: env_or("GEOCODER_API_BASE", DEFAULT_GEOCODER_API_BASE),
            },
            tool_timeout: parse_secs("GATEWAY_TOOL_TIMEOUT_SECS")?,
        })
    }
}

/// Agent service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub bind: SocketAddr,
    pub mcp_server_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model: String,
    pub rpc_timeout: Duration,
    pub session_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Load configuration from environment.
    ///
    /// - `AGENT_BIND` (optional, default `0.0.0.0:8001`)
    /// - `MCP_SERVER_URL` (optional, default `http://mcp-server:8000`)
    /// - `OPENAI_API_KEY` (optional here; the agent reports not-ready without it)
    /// - `OPENAI_BASE_URL`, `AGENT_MODEL` (optional)
    /// - `AGENT_RPC_TIMEOUT_SECS` (optional, default 30): bound on every outbound RPC
    /// - `AGENT_SESSION_DIR` (optional): persist sessions as JSON lines under this directory
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            bind: parse_bind("AGENT_BIND", DEFAULT_AGENT_BIND)?,
            mcp_server_url: env_or("MCP_SERVER_URL", DEFAULT_MCP_SERVER_URL),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_base_url: env_or("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            model: env_or("AGENT_MODEL", DEFAULT_MODEL),
            rpc_timeout: parse_secs("AGENT_RPC_TIMEOUT_SECS")?,
            session_dir: env_opt("AGENT_SESSION_DIR").map(PathBuf::from),
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn parse_bind(key: &str, default: &str) -> Result<SocketAddr, String> {
    env_or(key, default)
        .parse::<SocketAddr>()
        .map_err(|e| format!("{key} must be a socket address (host:port): {e}"))
}

fn parse_secs(key: &str) -> Result<Duration, String> {
    let secs = match env_opt(key) {
        Some(val) => val
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| format!("{key} must be a positive integer"))?,
        None => DEFAULT_TIMEOUT_SECS,
    };
    Ok(Duration::from_secs(secs))
}
