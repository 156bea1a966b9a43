//! Default path resolution for configuration files
//!
//! Uses XDG Base Directory specification when available, with sensible fallbacks.

use std::path::PathBuf;

/// Returns the default path for the static configuration file.
///
/// Uses XDG config directory if available:
/// - Linux/macOS: `~/.config/rcfleet/config.toml`
/// - Fallback: `/etc/rcfleet/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("rcfleet")
        .join("config.toml")
}

/// Returns the default data directory holding the fleet database.
///
/// Uses XDG data directory if available:
/// - Linux/macOS: `~/.local/share/rcfleet`
/// - Fallback: `/var/lib/rcfleet`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("rcfleet")
}
