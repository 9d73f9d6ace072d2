//! A small upstream for trying the proxy by hand.
//!
//! ```text
//! cargo run --example mock_backend -- --port 8000
//! cargo run -- --config edge-proxy.toml
//! curl -i http://127.0.0.1:8080/api/users
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{extract::{ConnectInfo, Request}, Json, Router};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
struct Args {
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

/// Echo the request line and headers as seen by the upstream.
async fn echo(ConnectInfo(peer): ConnectInfo<SocketAddr>, request: Request) -> Json<serde_json::Value> {
    let headers: BTreeMap<String, String> = request
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect();

    tracing::info!(method = %request.method(), uri = %request.uri(), peer = %peer, "Request received");

    Json(serde_json::json!({
        "method": request.method().as_str(),
        "uri": request.uri().to_string(),
        "headers": headers,
        "peer": peer.to_string(),
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("info"))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    tracing::info!(address = %listener.local_addr()?, "Mock backend listening");

    let app = Router::new().fallback(echo);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
