//! Shutdown handling for graceful daemon termination
//!
//! Leaves the vehicles steering straight when the daemon stops.

use crate::config::RuntimeConfig;
use crate::hardware::SerialLinkManager;
use rcfleet_core::SteerCommand;
use std::sync::Arc;
use tracing::{info, warn};

/// Write `STEER:C` before the daemon exits
///
/// Skipped when disabled in config, when there is no transport, or when the
/// link was never opened during this run.
pub async fn center_steering(
    runtime_config: &Arc<RuntimeConfig>,
    link: Option<&Arc<SerialLinkManager>>,
) {
    if !runtime_config.static_config().shutdown.center_steering {
        info!("Steering centering on shutdown disabled in config");
        return;
    }

    let Some(link) = link else {
        info!("No vehicle transport - nothing to center");
        return;
    };

    if link.status().await.opens == 0 {
        info!("Vehicle link never opened - skipping steering centering");
        return;
    }

    info!("Centering steering before shutdown...");
    match link.write_command(SteerCommand::Center.as_wire()).await {
        Ok(()) => info!("Steering centered"),
        Err(e) => warn!("Failed to center steering during shutdown: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::PortResolver;
    use rcfleet_core::{ShutdownConfig, StaticConfig};
    use rcfleet_hardware::{MockOpener, StaticEndpoints};
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(center_steering: bool, dir: &TempDir) -> Arc<RuntimeConfig> {
        let static_config = StaticConfig {
            shutdown: ShutdownConfig { center_steering },
            ..StaticConfig::with_data_dir(dir.path().to_path_buf())
        };
        Arc::new(RuntimeConfig::from_static(static_config))
    }

    fn link(opener: &MockOpener) -> Arc<SerialLinkManager> {
        Arc::new(SerialLinkManager::new(
            PortResolver::new(Arc::new(StaticEndpoints::mock_controller())),
            Arc::new(opener.clone()),
            115_200,
            Duration::ZERO,
        ))
    }

    #[tokio::test]
    async fn test_centers_open_link() {
        let dir = TempDir::new().unwrap();
        let opener = MockOpener::new();
        let link = link(&opener);
        link.write_command("STEER:L").await.unwrap();

        center_steering(&config(true, &dir), Some(&link)).await;

        assert_eq!(opener.lines(), vec!["STEER:L\n", "STEER:C\n"]);
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let opener = MockOpener::new();
        let link = link(&opener);
        link.write_command("STEER:L").await.unwrap();

        center_steering(&config(false, &dir), Some(&link)).await;

        assert_eq!(opener.lines(), vec!["STEER:L\n"]);
    }

    #[tokio::test]
    async fn test_unused_link_is_not_opened() {
        let dir = TempDir::new().unwrap();
        let opener = MockOpener::new();
        let link = link(&opener);

        center_steering(&config(true, &dir), Some(&link)).await;

        assert!(opener.opened_paths().is_empty());
    }

    #[tokio::test]
    async fn test_reopens_after_write_failure() {
        let dir = TempDir::new().unwrap();
        let opener = MockOpener::new();
        let link = link(&opener);
        link.write_command("STEER:R").await.unwrap();
        opener.fail_next_write();
        assert!(link.write_command("STEER:L").await.is_err());

        center_steering(&config(true, &dir), Some(&link)).await;

        assert_eq!(opener.lines(), vec!["STEER:R\n", "STEER:C\n"]);
    }

    #[tokio::test]
    async fn test_no_transport_returns_early() {
        let dir = TempDir::new().unwrap();
        center_steering(&config(true, &dir), None).await;
    }
}
