//! SHA Miner - sha256d getwork mining in Rust
//!
//! This crate provides a miner for pools speaking the HTTP JSON-RPC
//! `getwork` protocol, with support for:
//! - Scalar, SIMD-lane and OpenCL nonce search backends
//! - Per-resource benchmarking to pick the fastest backend
//! - Pool fail-over and long polling
//! - Hash-rate and hardware monitoring

#![warn(missing_docs)]
#![deny(unsafe_code)]

/// Miner core implementation including hashing, backends and scheduling
pub mod miner;

/// Network communication components for getwork pools
pub mod network;

/// Statistics collection and reporting functionality
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use miner::{HostState, Resource, Scheduler, SearchBackend, Work, Worker};
pub use network::{Pool, WorkProvider, WorkSource};
pub use stats::{HardwareStats, HashRateStats, MiningStats};
pub use types::BackendKind;
pub use utils::{MinerError, init_logging};
