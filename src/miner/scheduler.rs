// src/miner/scheduler.rs
//! Resource scheduler
//!
//! Owns the running workers. On start, a control thread groups the
//! candidate backends of every factory by resource, benchmarks the
//! candidates of resources claimed by more than one factory, and starts
//! the fastest one on each resource. Stop cancels the session, joins every
//! thread and resets the statistics.

use crate::miner::backend::NonceRange;
use crate::miner::factory::{BackendFactory, Resource};
use crate::miner::worker::Worker;
use crate::network::WorkProvider;
use crate::stats::{HashRateStats, HashSink, MiningStats, StatsTimer};
use crate::utils::MinerError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Lifecycle of a [`Scheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Nothing is running
    Stopped,
    /// The control thread is benchmarking and starting workers
    Starting,
    /// Every selected worker has been started
    Running,
    /// Workers are being cancelled and joined
    Stopping,
}

/// Timing knobs for the scheduler
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// How long each competing candidate runs during a benchmark
    pub sample_window: Duration,
    /// Period of the hash-rate sampler
    pub stats_interval: Duration,
    /// Period of the hash-rate log report; zero disables it
    pub report_interval: Duration,
    /// Nonces searched per work item
    pub range: NonceRange,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            sample_window: Duration::from_secs(5),
            stats_interval: Duration::from_millis(250),
            report_interval: Duration::from_secs(30),
            range: NonceRange::FULL,
        }
    }
}

/// A started worker
pub struct BackendBinding {
    /// Resource the worker is bound to
    pub resource: Resource,
    /// Name of the running backend
    pub backend_name: &'static str,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl BackendBinding {
    fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} worker on {} panicked", self.backend_name, self.resource);
            }
        }
    }
}

/// Public view of a binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    /// Resource the worker is bound to
    pub resource: Resource,
    /// Name of the running backend
    pub backend_name: &'static str,
}

struct Inner {
    state: HostState,
    cancel: Option<CancellationToken>,
    bindings: Vec<BackendBinding>,
    timer: Option<StatsTimer>,
    control: Option<JoinHandle<()>>,
}

struct Shared {
    factories: Vec<Box<dyn BackendFactory>>,
    provider: Arc<dyn WorkProvider>,
    stats: Arc<HashRateStats>,
    settings: SchedulerSettings,
    inner: Mutex<Inner>,
    changed: Condvar,
}

/// Coordinates backends across resources
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Creates a new, stopped scheduler
    ///
    /// # Arguments
    /// * `factories` - Backend factories to draw candidates from
    /// * `provider` - Work supply shared by every worker
    /// * `settings` - Benchmark and statistics timing
    pub fn new(
        factories: Vec<Box<dyn BackendFactory>>,
        provider: Arc<dyn WorkProvider>,
        settings: SchedulerSettings,
    ) -> Self {
        Scheduler {
            shared: Arc::new(Shared {
                factories,
                provider,
                stats: Arc::new(HashRateStats::new()),
                settings,
                inner: Mutex::new(Inner {
                    state: HostState::Stopped,
                    cancel: None,
                    bindings: Vec::new(),
                    timer: None,
                    control: None,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    /// Starts a session; does nothing unless stopped
    pub fn start(&self) -> Result<(), MinerError> {
        let mut inner = self.shared.inner.lock();
        if inner.state != HostState::Stopped {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let session = cancel.clone();
        let control = std::thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || control(shared, session))?;

        inner.state = HostState::Starting;
        inner.cancel = Some(cancel);
        inner.control = Some(control);
        self.shared.changed.notify_all();
        Ok(())
    }

    /// Stops the session and blocks until every thread has exited
    ///
    /// Safe to call in any state and from several threads.
    pub fn stop(&self) {
        let control = {
            let mut inner = self.shared.inner.lock();
            loop {
                match inner.state {
                    HostState::Stopped => return,
                    HostState::Stopping => self.shared.changed.wait(&mut inner),
                    HostState::Starting | HostState::Running => break,
                }
            }
            inner.state = HostState::Stopping;
            if let Some(cancel) = &inner.cancel {
                cancel.cancel();
            }
            self.shared.changed.notify_all();
            inner.control.take()
        };

        if let Some(control) = control {
            if control.join().is_err() {
                log::error!("Scheduler control thread panicked");
            }
        }

        let (bindings, timer) = {
            let mut inner = self.shared.inner.lock();
            (std::mem::take(&mut inner.bindings), inner.timer.take())
        };
        for mut binding in bindings {
            binding.stop();
        }
        self.shared.provider.stop_session();
        if let Some(timer) = timer {
            timer.stop();
        }
        self.shared.stats.reset();

        let mut inner = self.shared.inner.lock();
        inner.cancel = None;
        inner.state = HostState::Stopped;
        self.shared.changed.notify_all();
        log::info!("Scheduler stopped");
    }

    /// Current lifecycle state
    pub fn state(&self) -> HostState {
        self.shared.inner.lock().state
    }

    /// Blocks until the scheduler reaches `state` or `timeout` passes
    pub fn wait_for_state(&self, state: HostState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        while inner.state != state {
            if self
                .shared
                .changed
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return inner.state == state;
            }
        }
        true
    }

    /// Currently running workers
    pub fn bindings(&self) -> Vec<BindingInfo> {
        self.shared
            .inner
            .lock()
            .bindings
            .iter()
            .map(|b| BindingInfo {
                resource: b.resource.clone(),
                backend_name: b.backend_name,
            })
            .collect()
    }

    /// Hash rate over the rolling window
    pub fn hashes_per_second(&self) -> f64 {
        self.shared.stats.hashes_per_second()
    }

    /// Hashes computed this session
    pub fn total_hash_count(&self) -> u64 {
        self.shared.stats.total_hash_count()
    }

    /// Snapshot of every counter
    pub fn stats(&self) -> MiningStats {
        self.shared.stats.snapshot()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the control thread
fn control(shared: Arc<Shared>, cancel: CancellationToken) {
    shared.provider.start_session(&cancel);

    match StatsTimer::start(
        shared.stats.clone(),
        shared.settings.stats_interval,
        shared.settings.report_interval,
    ) {
        Ok(timer) => shared.inner.lock().timer = Some(timer),
        Err(e) => log::error!("Could not start stats timer: {}", e),
    }

    for (resource, factories) in candidates(&shared.factories) {
        if cancel.is_cancelled() {
            break;
        }
        let Some(factory) = select(&shared, &resource, &factories, &cancel) else {
            log::warn!("No usable backend for {}", resource);
            continue;
        };
        if cancel.is_cancelled() {
            break;
        }
        match bind(&shared, factory, &resource, HashSink::new(shared.stats.clone()), &cancel) {
            Ok(binding) => {
                log::info!("Running {} on {}", binding.backend_name, resource);
                shared.inner.lock().bindings.push(binding);
            }
            Err(e) => log::error!("Could not start {} on {}: {}", factory.name(), resource, e),
        }
    }

    let mut inner = shared.inner.lock();
    if inner.state == HostState::Starting {
        inner.state = HostState::Running;
        shared.changed.notify_all();
    }
}

/// Resources in first-advertised order, each with the factories claiming it
fn candidates(factories: &[Box<dyn BackendFactory>]) -> Vec<(Resource, Vec<&dyn BackendFactory>)> {
    let mut groups: Vec<(Resource, Vec<&dyn BackendFactory>)> = Vec::new();
    for factory in factories {
        for resource in factory.resources() {
            match groups.iter_mut().find(|(r, _)| *r == resource) {
                Some((_, claimed)) => claimed.push(factory.as_ref()),
                None => groups.push((resource, vec![factory.as_ref()])),
            }
        }
    }
    groups
}

/// Picks the factory to run on `resource`
///
/// A lone candidate is used as is. Otherwise each candidate mines for the
/// sample window with a private counter and the highest count wins; ties
/// go to the earlier factory. Candidates that fail to build are skipped.
fn select<'a>(
    shared: &Shared,
    resource: &Resource,
    factories: &[&'a dyn BackendFactory],
    cancel: &CancellationToken,
) -> Option<&'a dyn BackendFactory> {
    if let [only] = factories {
        return Some(*only);
    }

    let mut best: Option<(&'a dyn BackendFactory, u64)> = None;
    for factory in factories {
        if cancel.is_cancelled() {
            return None;
        }
        let counter = Arc::new(AtomicU64::new(0));
        let sink = HashSink::with_private(shared.stats.clone(), counter.clone());
        let mut binding = match bind(shared, *factory, resource, sink, cancel) {
            Ok(binding) => binding,
            Err(e) => {
                log::warn!("Excluding {} on {}: {}", factory.name(), resource, e);
                continue;
            }
        };

        wait_cancelled(shared, cancel, shared.settings.sample_window);
        binding.stop();

        let hashes = counter.load(Ordering::Relaxed);
        log::info!(
            "Benchmark {} on {}: {} hashes in {:?}",
            factory.name(),
            resource,
            hashes,
            shared.settings.sample_window
        );
        if best.is_none_or(|(_, top)| hashes > top) {
            best = Some((*factory, hashes));
        }
    }
    best.map(|(factory, _)| factory)
}

/// Builds a backend from `factory` and starts its worker thread
fn bind(
    shared: &Shared,
    factory: &dyn BackendFactory,
    resource: &Resource,
    sink: HashSink,
    cancel: &CancellationToken,
) -> Result<BackendBinding, MinerError> {
    let backend = factory.create(resource)?;
    let backend_name = backend.name();
    let cancel = cancel.child_token();
    let handle = Worker::new(
        resource.clone(),
        backend,
        Arc::clone(&shared.provider),
        sink,
        cancel.clone(),
    )
    .with_range(shared.settings.range)
    .spawn()?;

    Ok(BackendBinding {
        resource: resource.clone(),
        backend_name,
        cancel,
        handle: Some(handle),
    })
}

/// Sleeps for `duration` or until the session is cancelled
fn wait_cancelled(shared: &Shared, cancel: &CancellationToken, duration: Duration) {
    let deadline = Instant::now() + duration;
    let mut inner = shared.inner.lock();
    while !cancel.is_cancelled() {
        if shared.changed.wait_until(&mut inner, deadline).timed_out() {
            break;
        }
    }
}
