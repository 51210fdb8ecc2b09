//! Run the protocol compliance checks against a gateway.
//!
//! Usage: `gateway-compliance [--timeout-secs N] [BASE_URL]`. The URL defaults to
//! `MCP_SERVER_URL`, then `http://localhost:8000`.

use std::time::Duration;

use clap::Parser;
use tool_gateway::client::RpcClient;
use tool_gateway::compliance;

/// Command-line options for the compliance runner.
#[derive(Debug, Parser)]
#[command(name = "gateway-compliance", version)]
struct Cli {
    /// Gateway base URL
    #[arg(env = "MCP_SERVER_URL", default_value = "http://localhost:8000")]
    base_url: String,
    /// Seconds to wait for each RPC
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let base_url = cli.base_url;

    let client = match RpcClient::http(&base_url, Duration::from_secs(cli.timeout_secs)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("gateway-compliance: {e}");
            std::process::exit(2);
        }
    };

    let report = compliance::run(&client).await;
    for check in &report.checks {
        let mark = if check.passed { "PASS" } else { "FAIL" };
        println!("[{mark}] {}: {}", check.name, check.detail);
    }

    let failed = report.failures().count();
    println!("{} of {} checks passed against {base_url}", report.checks.len() - failed, report.checks.len());
    if failed > 0 {
        std::process::exit(1);
    }
}
