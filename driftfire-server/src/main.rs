//! Driftfire Relay Server
//!
//! Relays transforms, shots and damage claims between connected players.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use driftfire::{RelayServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Driftfire Server v{}", VERSION);

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    let server = RelayServer::bind(config.clone())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tokio::select! {
        result = server.run() => {
            result.context("relay server stopped")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
    }

    Ok(())
}
