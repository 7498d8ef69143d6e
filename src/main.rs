/// Chat Relay Server
///
/// Main server entry point. Handles:
/// - Command-line argument parsing
/// - Replaying the user and chat room logs
/// - TCP listener startup
use anyhow::Context;
use chat_relay_server::config::Config;
use chat_relay_server::server::{ChatServer, ServerState};
use std::fs;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let config = Config::from_args();

    log::info!("Starting Chat Relay Server");
    log::info!("Data directory: {:?}", config.data_dir);
    log::info!("Port: {}", config.port);

    // Write PID file if specified
    if let Some(pidfile) = &config.pidfile {
        let pid = process::id().to_string();
        fs::write(pidfile, pid)
            .with_context(|| format!("Failed to write PID file {:?}", pidfile))?;
        log::info!("PID file written to: {:?}", pidfile);
    }

    let state = ServerState::open(&config.data_dir)
        .with_context(|| format!("Failed to open data directory {:?}", config.data_dir))?;
    log::info!(
        "State restored: {} user(s), {} chat room(s)",
        state.accounts.len().await,
        state.rooms.len().await
    );

    let bind_addr = config.bind_addr();
    let server = ChatServer::bind(&bind_addr, Arc::new(state))
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    log::info!("Listening on {}", server.local_addr()?);

    server.run().await;
    Ok(())
}
