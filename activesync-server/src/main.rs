//! ActiveSync Gateway - Headless Daemon
//!
//! Serves the ActiveSync endpoint (`/Microsoft-Server-ActiveSync`) for mobile
//! mail clients and a REST API on `/api/*` for device administration.
//!
//! Default access: http://localhost:8046

mod activesync;
mod api;
mod cli;
mod commands;
mod middleware;
mod router;
mod state;

#[cfg(test)]
mod test_helpers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;

use activesync_core::config::{database_path, default_config_path, load_config};
use activesync_core::logger::init_logger;
use activesync_core::SqliteDeviceStore;
use activesync_types::ServerConfig;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::HashPassword { password }) = &cli.command {
        return commands::handle_hash_password(password);
    }

    init_logger(&cli.log_level).map_err(|e| anyhow::anyhow!(e))?;

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path().map_err(|e| anyhow::anyhow!(e))?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    match cli.command {
        None => run_server(config, None, None).await,
        Some(Commands::Serve { host, port }) => run_server(config, host, port).await,
        Some(Commands::Devices(cmd)) => commands::handle_device_command(cmd, &config).await,
        Some(Commands::ResetPolicyKeys) => commands::handle_reset_policy_keys(&config).await,
        Some(Commands::SetUser { username, password }) => {
            commands::handle_set_user(&config_path, &username, &password)
        },
        Some(Commands::HashPassword { password }) => commands::handle_hash_password(&password),
    }
}

async fn run_server(
    mut config: ServerConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    info!("🚀 ActiveSync Gateway v{} starting...", env!("CARGO_PKG_VERSION"));

    let db_path = database_path(&config).map_err(|e| anyhow::anyhow!(e))?;
    let store = SqliteDeviceStore::open(&db_path)
        .with_context(|| format!("Failed to open device database {}", db_path.display()))?;
    info!("💾 Device state in {}", db_path.display());

    if config.users.is_empty() {
        tracing::warn!("⚠️ No users configured; every login will be rejected");
    }
    if config.admin_api_key.is_empty() {
        tracing::warn!("⚠️ admin_api_key is empty; the admin API is disabled");
    }

    let ip: std::net::IpAddr = config
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", config.host, e))?;
    let addr = SocketAddr::new(ip, config.port);

    info!(
        "📱 Advertising EAS up to {} with provisioning {}",
        config.max_version, config.provisioning
    );

    let state = AppState::new(config, Arc::new(store));
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Server listening on http://{}", addr);
    info!("📨 ActiveSync endpoint at http://{}{}", addr, activesync::ACTIVESYNC_PATH);
    info!("🔌 Admin API at http://{}/api/", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("🛑 Received Ctrl+C, initiating graceful shutdown..."),
        () = terminate => info!("🛑 Received SIGTERM, initiating graceful shutdown..."),
    }
}
