// src/utils/logging.rs
//! Logging setup
//!
//! `env_logger` writing to stdout, one line per record:
//! `[<unix seconds> <LEVEL> <thread> <module>:<line>] <message>`.
//! Worker threads are named `<resource>/<backend>`, so every hashing
//! thread's output is attributable. `RUST_LOG` overrides the default level.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initializes logging for mining; defaults to `Info`
pub fn init_logging() {
    install(LevelFilter::Info);
}

/// Initializes logging for benchmarks; defaults to `Debug` so per-backend
/// progress is visible
pub fn init_bench_logging() {
    install(LevelFilter::Debug);
}

fn install(default: LevelFilter) {
    let mut builder = builder();
    match env::var("RUST_LOG") {
        Ok(filters) => builder.parse_filters(&filters),
        Err(_) => builder.filter_level(default),
    };
    // Only the first call in a process takes effect.
    let _ = builder.try_init();
}

fn builder() -> Builder {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            let now = buf.timestamp_seconds();
            let current = std::thread::current();
            writeln!(
                buf,
                "[{} {} {} {}:{}] {}",
                now,
                record.level(),
                current.name().unwrap_or("-"),
                record.module_path().unwrap_or_default(),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(Target::Stdout);
    builder
}
