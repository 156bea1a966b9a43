//! Configuration management module

mod runtime_config;

pub(crate) use runtime_config::RuntimeConfig;
