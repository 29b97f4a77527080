//! Coordinator Service binary
//!
//! Serves the session API and the worker-fleet attachment endpoints.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};

use coordinator_core::service::CoordinatorConfig;
use coordinator_svc::{app, AppState};
use worker_bus::ChannelBus;

/// Session coordinator CLI arguments
#[derive(Parser, Debug)]
#[command(name = "coordinator-svc")]
#[command(about = "Session coordinator for threshold key generation and signing")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN_ADDRESS", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Relay address handed to workers in outbound commands
    #[arg(short, long, env = "RELAY_ADDRESS", default_value = "http://127.0.0.1:8000")]
    relay: String,

    /// Signing deadline handed to workers, in seconds
    #[arg(long, env = "SIGN_TIMEOUT_SECONDS", default_value = "120")]
    sign_timeout: u64,

    /// Command history TTL in seconds
    #[arg(long, default_value = "3600")]
    ttl: i64,

    /// Command channel capacity per attached worker
    #[arg(long, default_value = "100")]
    capacity: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!(
        listen = %args.listen,
        relay = %args.relay,
        sign_timeout = args.sign_timeout,
        "Starting session coordinator"
    );

    let bus = Arc::new(ChannelBus::new(args.capacity, args.ttl));
    let state = Arc::new(AppState::new(
        CoordinatorConfig {
            relay_address: args.relay,
            sign_timeout_seconds: args.sign_timeout,
        },
        bus.clone(),
    ));

    // Spawn history cleanup task
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            bus.cleanup();
        }
    });

    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(address = %args.listen, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
