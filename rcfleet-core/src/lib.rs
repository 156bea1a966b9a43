//! rcfleet Core Library
//!
//! Shared types, models, and utilities for the rcfleet vehicle control
//! service. This crate is used by the hardware and daemon crates.

pub mod api;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    default_config_path, default_data_dir, FleetConfig, SerialConfig, ServerConfig,
    ShutdownConfig, StaticConfig,
};
pub use error::*;
pub use types::*;
