//! Configuration types for rcfleet
//!
//! [`StaticConfig`] holds server, serial link, fleet access and shutdown
//! settings. It is loaded once at startup from a TOML file; fleet data itself
//! (identities, vehicles, grants) lives in the daemon's database under
//! `data_dir`.

mod paths;
mod static_config;

pub use paths::{default_config_path, default_data_dir};
pub use static_config::{FleetConfig, SerialConfig, ServerConfig, ShutdownConfig, StaticConfig};
