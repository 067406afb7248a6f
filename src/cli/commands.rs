// src/cli/commands.rs
use crate::types::BackendKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SHA Miner CLI - sha256d getwork mining in Rust
#[derive(Parser, Debug)]
#[command(name = "sha_miner-rs")]
#[command(version, about, long_about = None)]
pub struct Commands {
    /// The action to perform (start mining, run benchmarks, list resources or generate config)
    #[command(subcommand)]
    pub action: Action,
}

/// Top-level commands for the miner application
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Start mining against the configured pools
    Start(StartOptions),

    /// Measure the hash rate of every available backend on offline work
    Benchmark(BenchmarkOptions),

    /// List compute resources and the backends that can run on them
    Resources,

    /// Generate configuration file template
    Config(ConfigOptions),
}

/// Options for starting the mining operation
#[derive(Parser, Debug)]
pub struct StartOptions {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Pool URL; repeat for fail-over (replaces the configured pools)
    #[arg(short, long)]
    pub pool: Vec<String>,

    /// Backend allowed to run; repeat to allow several (overrides config)
    #[arg(short, long, value_enum)]
    pub backend: Vec<BackendKind>,
}

/// Options for running mining benchmarks
#[derive(Parser, Debug)]
pub struct BenchmarkOptions {
    /// Seconds to run each backend for
    #[arg(short, long, default_value_t = 10)]
    pub duration: u64,

    /// Only benchmark this backend
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendKind>,
}

/// Options for generating configuration files
#[derive(Parser, Debug)]
pub struct ConfigOptions {
    /// Output file path
    #[arg(short, long, default_value = "config.toml")]
    pub output: PathBuf,

    /// Pool URL to put in the template; repeat for several
    #[arg(short, long)]
    pub pool: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_accepts_repeated_overrides() {
        let cli = Commands::try_parse_from([
            "sha_miner-rs",
            "start",
            "--pool",
            "http://a/",
            "-p",
            "http://b/",
            "--backend",
            "scalar",
            "-b",
            "opencl",
        ])
        .unwrap();
        let Action::Start(opts) = cli.action else {
            panic!("expected start");
        };
        assert_eq!(opts.config, PathBuf::from("config.toml"));
        assert_eq!(opts.pool, vec!["http://a/", "http://b/"]);
        assert_eq!(opts.backend, vec![BackendKind::Scalar, BackendKind::OpenCl]);
    }

    #[test]
    fn benchmark_defaults() {
        let cli = Commands::try_parse_from(["sha_miner-rs", "benchmark"]).unwrap();
        let Action::Benchmark(opts) = cli.action else {
            panic!("expected benchmark");
        };
        assert_eq!(opts.duration, 10);
        assert_eq!(opts.backend, None);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Commands::try_parse_from(["sha_miner-rs", "start", "-b", "fpga"]).is_err());
    }
}
