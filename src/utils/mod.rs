// src/utils/mod.rs
//! Shared plumbing
//!
//! The crate error type, logger setup, and the priority and affinity calls
//! made by every hashing thread when it starts.

/// The [`MinerError`] enum and its conversions
pub mod error;

/// `env_logger` setup for mining and benchmark runs
pub mod logging;

/// Scheduling priority and core affinity for hashing threads
pub mod thread;

pub use error::MinerError;
pub use logging::init_logging;
