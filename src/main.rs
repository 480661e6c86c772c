use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use payment_gateway::config::{load_config, GatewayConfig};
use payment_gateway::http::HttpServer;
use payment_gateway::lifecycle::{spawn_signal_handler, Shutdown};
use payment_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "payment-gateway")]
#[command(about = "Rate-limited, circuit-protected payment gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file; defaults are used when omitted
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "payment-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit = config.rate_limit.requests_per_window,
        window_secs = config.rate_limit.window_secs,
        payment_url = %config.downstream.payment.base_url,
        mail_url = %config.downstream.mail.base_url,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(&shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
