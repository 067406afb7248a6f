// src/network/mod.rs
//! Network communication components
//!
//! This module handles all network interactions with getwork pools:
//! - `rpc`: JSON-RPC message shapes
//! - `pool`: one HTTP endpoint, its block number and long-poll state
//! - `source`: fail-over over several pools behind a blocking interface

/// JSON-RPC request and response types
pub mod rpc;

/// Getwork pool client implementation
///
/// Handles HTTP JSON-RPC work fetches and submissions, long polling and
/// block number tracking for a single endpoint.
pub mod pool;

/// Work source over the configured pools
///
/// Provides the blocking [`WorkProvider`] interface used by worker threads,
/// with fail-over, submission retries and per-pool block watchers.
pub mod source;

#[cfg(test)]
pub(crate) mod stub;

// Re-export main components for cleaner imports
pub use pool::{Pool, Requester};
pub use source::{SourceSettings, WorkProvider, WorkSource};
