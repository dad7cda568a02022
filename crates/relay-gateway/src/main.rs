use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

mod app;
mod auth;
mod calendar_provider;
mod error;
mod http;
mod llm_null;
mod router;
mod ws;

/// Omnichannel conversation routing and agent orchestration gateway.
#[derive(Parser, Debug)]
#[command(name = "relay-gateway")]
struct Cli {
    /// Path to a TOML config file. Falls back to `RELAY_CONFIG` env, then
    /// `~/.relay/relay.toml`, then built-in defaults.
    #[arg(long)]
    config: Option<String>,

    /// Override the configured bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.or_else(|| std::env::var("RELAY_CONFIG").ok());
    let mut config = relay_core::config::RelayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({}), using defaults", e);
        relay_core::config::RelayConfig::default()
    });
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = Arc::new(app::AppState::new(config).await?);
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!("relay gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
