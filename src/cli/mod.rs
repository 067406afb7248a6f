// src/cli/mod.rs
//! Command-line interface
//!
//! Subcommands: `start`, `benchmark`, `resources` and `config`.

/// Clap definitions of the commands and their options
pub mod commands;

pub use commands::{Action, BenchmarkOptions, Commands, ConfigOptions, StartOptions};
