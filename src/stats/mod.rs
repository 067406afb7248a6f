//! Hash-rate and share statistics
//!
//! Workers count hashes into [`HashRateStats`] through a [`HashSink`].
//! While a session runs, a [`StatsTimer`] thread samples the counters into
//! a rolling window and periodically logs the rate together with host
//! CPU load and temperature.

/// Counters, the sampling timer and the hardware monitor
pub mod reporter;

pub use reporter::{HardwareStats, HashRateStats, HashSink, MiningStats, StatsTimer};
