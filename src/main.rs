//! Edge proxy binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use edge_proxy::config::load_config;
use edge_proxy::lifecycle::signals;
use edge_proxy::net::Listener;
use edge_proxy::observability::{logging, metrics};
use edge_proxy::{HttpServer, ProxyContext, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "edge-proxy", version, about = "Static files and a single upstream behind one listener")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "edge-proxy.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "edge-proxy starting"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let context = Arc::new(ProxyContext::init(&config).await?);
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown.clone());

    HttpServer::new(context).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
