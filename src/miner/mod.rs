// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components related to the mining process:
//! - SHA-256 primitives and the getwork unit of work
//! - Nonce search backends and the factories that bind them to resources
//! - Worker threads and the scheduler that benchmarks and runs them

/// SHA-256 compression function and double-hash helpers
pub mod sha256;

/// Getwork headers, targets and their wire encoding
pub mod work;

/// Nonce search backends
///
/// Contains the implementations of the search loop:
/// - scalar reference search
/// - lane-parallel search for SIMD-capable CPUs
/// - OpenCL kernel dispatch (feature `opencl`)
pub mod backend;

/// Compute resources and backend factories
pub mod factory;

/// Resource scheduler
///
/// Benchmarks competing backends per resource, starts the winners and
/// owns the statistics timer for the length of a session.
pub mod scheduler;

/// Worker thread implementation
///
/// Contains the loop that pulls work, searches it and submits solutions.
pub mod worker;

// Re-export main components for cleaner imports
pub use self::backend::{NonceRange, SearchBackend, SearchContext};
pub use self::factory::{BackendFactory, Resource};
pub use self::scheduler::{BindingInfo, HostState, Scheduler, SchedulerSettings};
pub use self::work::{Target, Work};
pub use self::worker::Worker;
