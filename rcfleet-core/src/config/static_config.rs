//! Static configuration loaded once at startup
//!
//! This configuration is read-only after the daemon starts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::paths::default_data_dir;
use crate::types::{AccessMode, Calibration, DEFAULT_FALLBACK_VEHICLE};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind when `--bind` is not given
    pub hostname: String,
    /// Server port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Serial link configuration
///
/// Baud rate and settle delay are fixed for the lifetime of the process;
/// nothing is negotiated with the firmware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Run with a serial transport at all
    pub enabled: bool,
    /// Serial baud rate
    pub baud_rate: u32,
    /// Delay after opening the port (covers the microcontroller's reset-on-open)
    pub settle_delay_ms: u64,
    /// Bound on each write and flush
    pub write_timeout_ms: u64,
    /// Pinned device path; skips endpoint discovery when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    /// Log every line sent to the device
    pub debug_uart: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            baud_rate: 115_200,
            settle_delay_ms: 1500,
            write_timeout_ms: 200,
            port: None,
            debug_uart: false,
        }
    }
}

impl SerialConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Fleet access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Vehicle every identity is granted when it has none
    pub fallback_vehicle: String,
    /// Many-to-many grants, or one vehicle per identity
    pub access_mode: AccessMode,
    /// Calibration used for vehicles created on demand
    pub default_calibration: Calibration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            fallback_vehicle: DEFAULT_FALLBACK_VEHICLE.to_string(),
            access_mode: AccessMode::default(),
            default_calibration: Calibration::default(),
        }
    }
}

/// Shutdown behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Send `STEER:C` before exiting so vehicles are left straight
    pub center_steering: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            center_steering: true,
        }
    }
}

/// Static configuration for the rcfleet daemon.
///
/// Loaded once at startup and immutable during runtime.
/// Located at `~/.config/rcfleet/config.toml` by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    /// Server configuration (hostname, port)
    #[serde(default)]
    pub server: ServerConfig,

    /// Serial link configuration
    #[serde(default)]
    pub serial: SerialConfig,

    /// Fleet access configuration
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Shutdown behavior
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Directory for the fleet database
    ///
    /// Defaults to `~/.local/share/rcfleet` (XDG data directory).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            serial: SerialConfig::default(),
            fleet: FleetConfig::default(),
            shutdown: ShutdownConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl StaticConfig {
    /// Create a new StaticConfig with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Path of the SQLite fleet database inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("fleet.db")
    }

    /// Parse StaticConfig from TOML string.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize StaticConfig to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
