// src/main.rs
use clap::Parser;
use sha_miner_rs::miner::factory::{self, BackendFactory, Resource};
use sha_miner_rs::miner::{SearchContext, Work};
use sha_miner_rs::utils::logging::init_bench_logging;
use sha_miner_rs::{self, *};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main entry point for the SHA miner
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_mining(opts),
        cli::Action::Benchmark(opts) => run_benchmark(opts),
        cli::Action::Resources => list_resources(),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Starts mining and runs until interrupted
///
/// # Operations
/// 1. Initializes logging
/// 2. Loads the configuration and applies CLI overrides
/// 3. Opens the work source over the configured pools
/// 4. Starts the scheduler and waits for Ctrl-C
/// 5. Stops the scheduler, joining every worker
fn start_mining(opts: cli::StartOptions) -> Result<(), MinerError> {
    utils::init_logging();

    let mut config = config::load(&opts.config)?;
    // Apply CLI overrides
    if !opts.pool.is_empty() {
        config.pools = opts.pool;
    }
    if !opts.backend.is_empty() {
        config.backends = Some(opts.backend);
    }
    config.validate()?;

    let source = WorkSource::new(&config.pools, config.source_settings())?;
    let factories = factory::enabled_factories(config.backends.as_deref());
    if factories.is_empty() {
        return Err(MinerError::ConfigError("No backend is enabled".into()));
    }

    let scheduler = Scheduler::new(factories, Arc::new(source), config.scheduler_settings());
    scheduler.start()?;
    log::info!("Mining for {} pool(s); press Ctrl-C to stop", config.pools.len());

    let signals = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    signals.block_on(tokio::signal::ctrl_c())?;

    log::info!("Shutting down");
    scheduler.stop();
    Ok(())
}

/// Runs every available backend on offline work and logs its hash rate
///
/// Each backend runs alone on the first resource its factory offers, for
/// `opts.duration` seconds.
fn run_benchmark(opts: cli::BenchmarkOptions) -> Result<(), MinerError> {
    init_bench_logging();

    let only = opts.backend.map(|kind| [kind]);
    let factories = factory::enabled_factories(only.as_ref().map(|k| &k[..]));
    let duration = Duration::from_secs(opts.duration.max(1));

    let mut results = Vec::new();
    for factory in &factories {
        let Some(resource) = factory.resources().into_iter().next() else {
            log::warn!("{}: no resources available", factory.name());
            continue;
        };
        match bench_one(factory.as_ref(), &resource, duration) {
            Ok(rate) => {
                log::info!("{} on {}: {:.2} MH/s", factory.name(), resource, rate / 1e6);
                results.push((factory.name(), rate));
            }
            Err(e) => log::error!("{} on {} failed: {}", factory.name(), resource, e),
        }
    }

    if let Some((name, rate)) = results.iter().max_by(|a, b| a.1.total_cmp(&b.1)) {
        log::info!("Fastest backend: {} ({:.2} MH/s)", name, rate / 1e6);
    }
    log::logger().flush(); // Ensure final results appear
    Ok(())
}

/// Hashes per second of one backend over `duration`
fn bench_one(
    factory: &dyn BackendFactory,
    resource: &Resource,
    duration: Duration,
) -> Result<f64, MinerError> {
    let mut backend = factory.create(resource)?;
    let work = Work::benchmark();
    let ctx = SearchContext::new(&work);

    log::info!("Benchmarking {} on {} for {:?}", backend.name(), resource, duration);
    let started = Instant::now();
    let deadline = started + duration;
    let mut hashes = 0u64;
    while Instant::now() < deadline {
        let found = backend.search(&work, &ctx, &mut |n| {
            hashes += n;
            Instant::now() < deadline
        });
        if let Some(nonce) = found {
            log::warn!("Benchmark work unexpectedly solved by nonce {:#010x}", nonce);
        }
    }

    Ok(hashes as f64 / started.elapsed().as_secs_f64())
}

/// Prints every resource and the backends able to run on it
fn list_resources() -> Result<(), MinerError> {
    utils::init_logging();

    let factories = factory::registry();
    let mut resources: Vec<(Resource, Vec<&'static str>)> = Vec::new();
    for factory in &factories {
        for resource in factory.resources() {
            match resources.iter_mut().find(|(r, _)| *r == resource) {
                Some((_, names)) => names.push(factory.name()),
                None => resources.push((resource, vec![factory.name()])),
            }
        }
    }

    if resources.is_empty() {
        println!("No compute resources found");
    }
    for (resource, names) in resources {
        println!("{:<32} {}", resource.to_string(), names.join(", "));
    }
    Ok(())
}

/// Generates configuration template file
///
/// # Arguments
/// * `opts` - Configuration generation options
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    let config = config::generate_template(&opts.pool);
    std::fs::write(&opts.output, config)?;
    println!("Wrote {}", opts.output.display());
    Ok(())
}
