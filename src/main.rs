use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber;

use floodgate::config::FloodgateConfig;
use floodgate::http::HttpServer;
use floodgate::limiter::{Policy, RateLimiter, RedisStore};

/// Distributed per-identity rate limiting service backed by Redis.
#[derive(Parser, Debug)]
#[command(name = "floodgate", version, about)]
struct Args {
    /// Path to a config file layered under the environment
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    info!("Starting Floodgate Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = FloodgateConfig::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    info!(
        listen_addr = %config.server.listen_addr,
        redis_url = %config.redis.url,
        limit = config.policy.limit,
        window_seconds = config.policy.window_seconds,
        "Configuration loaded"
    );

    // Initialize the rate limiter over the shared store
    let store = Arc::new(RedisStore::from_config(&config.redis)?);
    let policy = Policy::from_config(&config.policy)?;
    let limiter = Arc::new(RateLimiter::new(store, policy));
    info!("Rate limiter initialized");

    // Create and start the HTTP server
    let server = HttpServer::new(config.server.listen_addr, limiter);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Floodgate Rate Limiting Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
