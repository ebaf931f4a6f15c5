//! Multi-room Chat Server - Entry Point
//!
//! Loads configuration, starts the ChatServer actor and accepts connections
//! until interrupted.

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use roomcast::{ChatHandle, ChatServer, Config, Listener};

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=roomcast=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roomcast=info")),
        )
        .init();

    let config = Config::load().inspect_err(|e| error!("Configuration error: {}", e))?;
    config
        .validate()
        .inspect_err(|e| error!("Configuration error: {}", e))?;
    info!("Starting with {:?}", config);

    // Create ChatServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    tokio::spawn(ChatServer::new(cmd_rx).run());

    info!("ChatServer actor started");

    let listener = Listener::bind(&config, ChatHandle::new(cmd_tx)).await?;

    tokio::select! {
        _ = listener.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
