//! rcfleet daemon
//!
//! REST API server that lets registered identities steer the vehicles they
//! hold grants for. Commands travel over a single serial link to the
//! vehicle controller.
//!
//! # Transport modes
//!
//! - **serial** (default): the controller is discovered by scoring the host's
//!   serial endpoints, unless a device is pinned with `--device`,
//!   `RCFLEET_PORT` or `serial.port`.
//! - **mock** (`--mock`): commands are logged, no hardware is touched.
//! - **disabled** (`serial.enabled = false`): control requests fail with 503.

mod api;
mod config;
mod dispatch;
mod fleet;
mod hardware;
mod shutdown;

use anyhow::Result;
use api::AppState;
use clap::Parser;
use config::RuntimeConfig;
use fleet::{FleetAccessRegistry, SqliteFleetStore};
use hardware::connection;
use rcfleet_core::{default_config_path, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Environment variable overriding the config file location
const CONFIG_ENV: &str = "RCFLEET_CONFIG";

/// rcfleet API Server
#[derive(Parser, Debug)]
#[command(name = "rcfleetd")]
#[command(version, about = "rc vehicle fleet control server", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server bind address (defaults to `server.hostname` from the config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable mock mode (run without hardware for testing/development)
    #[arg(long)]
    mock: bool,

    /// Serial device path (e.g., /dev/ttyACM0, COM5)
    ///
    /// Skips endpoint discovery. Takes precedence over RCFLEET_PORT and
    /// `serial.port` in the config file.
    #[arg(long)]
    device: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    info!("rcfleet server starting...");

    // Config path: CLI flag > env var > default
    let config_path = args.config.unwrap_or_else(|| {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path())
    });
    info!("Configuration file: {}", config_path.display());

    let runtime_config = Arc::new(RuntimeConfig::load(&config_path).await?);
    info!("  Data directory: {}", runtime_config.data_dir().display());

    let bind_addr = bind_address(
        args.bind,
        args.port,
        &runtime_config.static_config().server,
    );

    // Fleet store and registry
    let database_path = runtime_config.database_path();
    info!("Fleet database: {}", database_path.display());
    let store = match SqliteFleetStore::open(&database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open fleet database: {}", e);
            return Err(e.into());
        }
    };
    let registry = Arc::new(FleetAccessRegistry::new(
        store,
        runtime_config.static_config().fleet.clone(),
    ));
    let fallback = registry.ensure_fallback_vehicle()?;
    info!(
        "Fallback vehicle '{}' has id {}",
        registry.fallback_vehicle_name(),
        fallback
    );

    // Vehicle link
    let serial_config = &runtime_config.static_config().serial;
    let device = connection::pinned_device(args.device, serial_config);
    let (transport_mode, link) = connection::build_link(serial_config, args.mock, device);
    info!("Transport mode: {}", transport_mode.as_str());

    let config_for_shutdown = runtime_config.clone();
    let link_for_shutdown = link.clone();

    let app_state = AppState::new(registry, runtime_config, link, transport_mode);
    let app = api::create_router(app_state);

    info!("Starting server on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("rcfleet API server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown::center_steering(&config_for_shutdown, link_for_shutdown.as_ref()).await;
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen address: CLI flags win over the `[server]` section
fn bind_address(bind: Option<String>, port: Option<u16>, server: &ServerConfig) -> String {
    let host = bind.unwrap_or_else(|| server.hostname.clone());
    format!("{}:{}", host, port.unwrap_or(server.port))
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address_falls_back_to_config() {
        let server = ServerConfig {
            hostname: "0.0.0.0".to_string(),
            port: 8080,
        };
        assert_eq!(bind_address(None, None, &server), "0.0.0.0:8080");
        assert_eq!(
            bind_address(Some("127.0.0.1".to_string()), Some(3001), &server),
            "127.0.0.1:3001"
        );
    }

    #[test]
    fn test_default_config_binds_loopback() {
        assert_eq!(
            bind_address(None, None, &ServerConfig::default()),
            "127.0.0.1:3000"
        );
    }
}
