//! Runtime configuration
//!
//! Loads the static configuration file and prepares the data directory that
//! holds the fleet database.

use rcfleet_core::{FleetError, Result, StaticConfig};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Upper bound on `serial.settle_delay_ms`
pub(crate) const MAX_SETTLE_DELAY_MS: u64 = 10_000;

/// Configuration the daemon runs with.
///
/// Read once at startup; immutable afterwards.
pub(crate) struct RuntimeConfig {
    static_config: StaticConfig,
}

impl RuntimeConfig {
    /// Load configuration from disk.
    ///
    /// If the config file doesn't exist, creates it with defaults.
    /// If the data directory doesn't exist, creates it.
    pub async fn load(config_path: &Path) -> Result<Self> {
        info!("Loading configuration from: {}", config_path.display());

        let static_config = Self::load_static_config(config_path).await?;
        Self::validate(&static_config)?;
        Self::ensure_data_dir(&static_config.data_dir).await?;
        Self::debug_config(&static_config);

        Ok(Self { static_config })
    }

    /// Wrap an already-built configuration (tests, embedded use).
    pub fn from_static(static_config: StaticConfig) -> Self {
        Self { static_config }
    }

    /// Load static config from TOML file, creating with defaults if missing.
    async fn load_static_config(path: &Path) -> Result<StaticConfig> {
        if !path.exists() {
            info!(
                "Static config not found at {}. Creating with defaults.",
                path.display()
            );

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    FleetError::Config(format!(
                        "Failed to create config directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }

            let config = StaticConfig::default();
            let toml_str = config
                .to_toml()
                .map_err(|e| FleetError::Config(format!("Failed to serialize config: {}", e)))?;

            fs::write(path, &toml_str)
                .await
                .map_err(|e| FleetError::Config(format!("Failed to write config file: {}", e)))?;

            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| FleetError::Config(format!("Failed to read config file: {}", e)))?;

        StaticConfig::from_toml(&content)
            .map_err(|e| FleetError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Reject serial timings the link cannot work with.
    fn validate(config: &StaticConfig) -> Result<()> {
        let serial = &config.serial;
        if serial.write_timeout_ms == 0 {
            return Err(FleetError::Config(
                "serial.write_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if serial.settle_delay_ms > MAX_SETTLE_DELAY_MS {
            return Err(FleetError::Config(format!(
                "serial.settle_delay_ms must be at most {} (got {})",
                MAX_SETTLE_DELAY_MS, serial.settle_delay_ms
            )));
        }
        Ok(())
    }

    /// Ensure data directory exists and is writable.
    async fn ensure_data_dir(data_dir: &Path) -> Result<()> {
        if !data_dir.exists() {
            info!("Creating data directory: {}", data_dir.display());
            fs::create_dir_all(data_dir).await.map_err(|e| {
                FleetError::Config(format!(
                    "Failed to create data directory '{}': {}. \
                     Please create it manually or check permissions.",
                    data_dir.display(),
                    e
                ))
            })?;
        }

        let test_file = data_dir.join(".write_test");
        fs::write(&test_file, "test").await.map_err(|e| {
            FleetError::Config(format!(
                "Data directory '{}' is not writable: {}",
                data_dir.display(),
                e
            ))
        })?;
        let _ = fs::remove_file(&test_file).await;

        Ok(())
    }

    fn debug_config(config: &StaticConfig) {
        debug!("--- Server Config ---");
        debug!("  Host: {}", config.server.hostname);
        debug!("  Port: {}", config.server.port);
        debug!("--- Serial Config ---");
        debug!("  Enabled: {}", config.serial.enabled);
        debug!("  Baud rate: {}", config.serial.baud_rate);
        debug!("  Settle delay: {}ms", config.serial.settle_delay_ms);
        debug!("  Write timeout: {}ms", config.serial.write_timeout_ms);
        if let Some(port) = &config.serial.port {
            debug!("  Pinned port: {}", port);
        }
        debug!("--- Fleet Config ---");
        debug!("  Fallback vehicle: {}", config.fleet.fallback_vehicle);
        debug!("  Access mode: {:?}", config.fleet.access_mode);
        debug!("--------------------");
    }

    /// Get reference to static configuration.
    pub fn static_config(&self) -> &StaticConfig {
        &self.static_config
    }

    /// Get data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.static_config.data_dir
    }

    /// Path of the SQLite fleet database.
    pub fn database_path(&self) -> PathBuf {
        self.static_config.database_path()
    }
}
