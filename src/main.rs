use tool_gateway::config::GatewayConfig;
use tool_gateway::server::{self, HttpServer};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tool_gateway=info,warn")),
        )
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("tool-gateway: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let invoker = match server::invoker_from_config(&config) {
        Ok(invoker) => invoker,
        Err(e) => {
            eprintln!("tool-gateway: fatal error: {e}");
            std::process::exit(1);
        }
    };

    let server = match HttpServer::start(config.bind, server::router(invoker)).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("tool-gateway: failed to bind {}: {e}", config.bind);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    server.shutdown().await;
}
