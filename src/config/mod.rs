// src/config/mod.rs
//! Miner configuration
//!
//! A TOML file listing the getwork pools in fail-over order, an optional
//! allow-list of backends, and network, benchmark and statistics timings.
//! Only `pools` is required.

/// The [`Config`] struct, its defaults and validation
pub mod config;

pub use config::Config;

use crate::utils::error::MinerError;
use std::path::PathBuf;

/// Reads and parses the configuration file at `path`
///
/// The result is not validated; call [`Config::validate`] once CLI
/// overrides have been applied.
pub fn load(path: impl Into<PathBuf>) -> Result<Config, MinerError> {
    Config::load(path)
}

/// Commented TOML template listing `pools`, or a placeholder pool
pub fn generate_template(pools: &[String]) -> String {
    Config::generate_template(pools)
}
