use std::sync::Arc;

use tool_gateway::agent::server::{self, AgentContext};
use tool_gateway::config::AgentConfig;
use tool_gateway::server::HttpServer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tool_gateway=info,warn")),
        )
        .init();

    let config = match AgentConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("tool-agent: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let ctx = Arc::new(AgentContext::init(&config).await);
    let server = match HttpServer::start(config.bind, server::router(ctx.clone())).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("tool-agent: failed to bind {}: {e}", config.bind);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    server.shutdown().await;

    match Arc::try_unwrap(ctx) {
        Ok(ctx) => ctx.shutdown(),
        Err(_) => tracing::warn!("agent context still shared at shutdown"),
    }
}
