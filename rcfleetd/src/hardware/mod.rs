//! Hardware abstraction layer for the vehicle link
//!
//! Re-export the link types from the `rcfleet_hardware` crate so the rest of
//! `rcfleetd` does not depend on its internal module layout.

pub(crate) use rcfleet_hardware::{CommandTransport, PortResolver, SerialLinkManager};

/// Link construction from configuration and CLI flags
pub(crate) mod connection {
    use super::*;
    use rcfleet_core::SerialConfig;
    use rcfleet_hardware::{LoggingOpener, StaticEndpoints};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::info;

    /// Environment variable pinning the serial device path
    pub const PORT_ENV: &str = "RCFLEET_PORT";

    /// How commands reach the vehicles
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TransportMode {
        Serial,
        Mock,
        Disabled,
    }

    impl TransportMode {
        pub fn as_str(&self) -> &'static str {
            match self {
                TransportMode::Serial => "serial",
                TransportMode::Mock => "mock",
                TransportMode::Disabled => "disabled",
            }
        }
    }

    /// Pinned device path: CLI flag, then environment, then config file
    pub fn pinned_device(cli: Option<String>, config: &SerialConfig) -> Option<String> {
        cli.or_else(|| std::env::var(PORT_ENV).ok().filter(|p| !p.trim().is_empty()))
            .or_else(|| config.port.clone())
    }

    /// Build the link manager for the selected transport mode
    ///
    /// Nothing is opened here; the link opens on the first command.
    pub fn build_link(
        config: &SerialConfig,
        mock: bool,
        device: Option<String>,
    ) -> (TransportMode, Option<Arc<SerialLinkManager>>) {
        if mock {
            info!("Mock mode: commands are logged, no hardware is touched");
            let link = SerialLinkManager::new(
                PortResolver::new(Arc::new(StaticEndpoints::mock_controller())),
                Arc::new(LoggingOpener),
                config.baud_rate,
                Duration::ZERO,
            );
            return (TransportMode::Mock, Some(Arc::new(link)));
        }

        if !config.enabled {
            info!("Serial transport disabled in config; control requests will fail");
            return (TransportMode::Disabled, None);
        }

        let config = SerialConfig {
            port: device,
            ..config.clone()
        };
        info!(
            "Serial transport: {} baud, settle {:?}, write timeout {:?}",
            config.baud_rate,
            config.settle_delay(),
            config.write_timeout()
        );
        let link = SerialLinkManager::from_config(&config, PortResolver::system());
        (TransportMode::Serial, Some(Arc::new(link)))
    }

}
