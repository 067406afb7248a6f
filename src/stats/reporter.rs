// src/stats/reporter.rs
use crossbeam_channel::{Sender, bounded, select, tick};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use sysinfo::{Components, System};

/// Number of samples kept in the rolling hash-rate window
pub const WINDOW_SAMPLES: usize = 25;

/// Snapshot of mining performance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MiningStats {
    /// Total number of hashes computed this session
    pub hashes_total: u64,
    /// Current hashrate over the rolling window (hashes per second)
    pub hashes_per_second: f64,
    /// Number of solutions accepted by a pool
    pub shares_accepted: u64,
    /// Number of solutions rejected by a pool
    pub shares_rejected: u64,
}

/// Statistics related to hardware performance
#[derive(Debug, Clone)]
pub struct HardwareStats {
    /// Current CPU usage percentage (0-100)
    pub cpu_usage: f32,
    /// Memory currently in use (in bytes)
    pub memory_used: u64,
    /// Current CPU temperature in Celsius
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    elapsed_ms: u64,
    hashes: u64,
}

/// Hash counters shared between workers and the sampling timer
///
/// Workers add to `pending`; the timer swaps it to zero every sample
/// interval and pushes `(elapsed, hashes)` into a window of the last
/// [`WINDOW_SAMPLES`] samples.
#[derive(Debug, Default)]
pub struct HashRateStats {
    pending: AtomicU64,
    total: AtomicU64,
    accepted: AtomicU64,
    rejected: AtomicU64,
    window: Mutex<VecDeque<Sample>>,
}

impl HashRateStats {
    /// Creates zeroed statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `hashes` computed by a worker
    pub fn add_hashes(&self, hashes: u64) {
        self.pending.fetch_add(hashes, Ordering::Relaxed);
        self.total.fetch_add(hashes, Ordering::Relaxed);
    }

    /// Counts benchmark hashes towards the total only
    pub fn add_unsampled(&self, hashes: u64) {
        self.total.fetch_add(hashes, Ordering::Relaxed);
    }

    /// Moves the pending count into the window as one sample
    pub fn sample(&self, elapsed: Duration) {
        let hashes = self.pending.swap(0, Ordering::Relaxed);
        self.record_sample(elapsed.as_millis() as u64, hashes);
    }

    /// Pushes a sample into the rolling window, evicting the oldest
    pub fn record_sample(&self, elapsed_ms: u64, hashes: u64) {
        let mut window = self.window.lock();
        window.push_back(Sample { elapsed_ms, hashes });
        while window.len() > WINDOW_SAMPLES {
            window.pop_front();
        }
    }

    /// Hash rate over the window, 0 when nothing has been sampled
    pub fn hashes_per_second(&self) -> f64 {
        let window = self.window.lock();
        let (ms, hashes) = window.iter().fold((0u64, 0u64), |(ms, hashes), s| {
            (ms + s.elapsed_ms, hashes + s.hashes)
        });
        if ms == 0 {
            0.0
        } else {
            hashes as f64 * 1000.0 / ms as f64
        }
    }

    /// Hashes computed since the last reset
    pub fn total_hash_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Records the pool's verdict on a submitted solution
    pub fn record_submission(&self, accepted: bool) {
        if accepted {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> MiningStats {
        MiningStats {
            hashes_total: self.total_hash_count(),
            hashes_per_second: self.hashes_per_second(),
            shares_accepted: self.accepted.load(Ordering::Relaxed),
            shares_rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter and empties the window
    pub fn reset(&self) {
        self.window.lock().clear();
        self.pending.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
        self.accepted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
    }
}

/// Where a worker reports its hashes
///
/// Normally feeds the shared statistics. During a benchmark it feeds a
/// private counter instead, so competing candidates can be compared, and
/// only the shared total.
#[derive(Debug, Clone)]
pub struct HashSink {
    stats: Arc<HashRateStats>,
    private: Option<Arc<AtomicU64>>,
}

impl HashSink {
    /// Sink feeding only the shared statistics
    pub fn new(stats: Arc<HashRateStats>) -> Self {
        HashSink {
            stats,
            private: None,
        }
    }

    /// Sink feeding `private` and the shared total
    pub fn with_private(stats: Arc<HashRateStats>, private: Arc<AtomicU64>) -> Self {
        HashSink {
            stats,
            private: Some(private),
        }
    }

    /// Counts `hashes`
    pub fn add(&self, hashes: u64) {
        match &self.private {
            Some(private) => {
                private.fetch_add(hashes, Ordering::Relaxed);
                self.stats.add_unsampled(hashes);
            }
            None => self.stats.add_hashes(hashes),
        }
    }

    /// Shared statistics behind this sink
    pub fn stats(&self) -> &Arc<HashRateStats> {
        &self.stats
    }
}

/// Collects host hardware readings for the periodic report
pub struct HardwareMonitor {
    system: System,
    components: Components,
}

impl HardwareMonitor {
    /// Creates a monitor with a fresh system snapshot
    pub fn new() -> Self {
        HardwareMonitor {
            system: System::new_all(),
            components: Components::new_with_refreshed_list(),
        }
    }

    /// Gets the current hardware statistics
    ///
    /// This refreshes system information before returning the stats.
    pub fn read(&mut self) -> HardwareStats {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();
        self.components.refresh(true);

        let cpus = self.system.cpus();
        let cpu_usage = if cpus.is_empty() {
            0.0
        } else {
            cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
        };

        let temperature = self
            .components
            .iter()
            .find(|c| c.label().contains("CPU"))
            .and_then(|c| c.temperature())
            .unwrap_or(0.0);

        HardwareStats {
            cpu_usage,
            memory_used: self.system.used_memory(),
            temperature,
        }
    }
}

impl Default for HardwareMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Background thread that samples [`HashRateStats`] and logs reports
///
/// Owned by the scheduler for the length of a session.
pub struct StatsTimer {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl StatsTimer {
    /// Starts sampling every `sample_interval`; logs a report every
    /// `report_interval` (never, if zero)
    pub fn start(
        stats: Arc<HashRateStats>,
        sample_interval: Duration,
        report_interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("stats".to_string())
            .spawn(move || {
                let ticker = tick(sample_interval);
                let mut monitor = HardwareMonitor::new();
                let mut last_sample = Instant::now();
                let mut last_report = Instant::now();

                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let now = Instant::now();
                            stats.sample(now - last_sample);
                            last_sample = now;

                            if !report_interval.is_zero() && now - last_report >= report_interval {
                                last_report = now;
                                report(&stats.snapshot(), &monitor.read());
                            }
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
            })?;

        Ok(StatsTimer {
            stop: stop_tx,
            handle: Some(handle),
        })
    }

    /// Stops the thread and waits for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Stats thread panicked");
            }
        }
    }
}

impl Drop for StatsTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn report(mining: &MiningStats, hardware: &HardwareStats) {
    log::info!(
        "Hashrate: {:.2} MH/s | Total: {} | Accepted/Rejected: {}/{} | CPU: {:.1}% | Temp: {:.1}°C",
        mining.hashes_per_second / 1_000_000.0,
        mining.hashes_total,
        mining.shares_accepted,
        mining.shares_rejected,
        hardware.cpu_usage,
        hardware.temperature
    );
}
