// src/miner/worker.rs
//! Worker thread implementation
//!
//! A worker owns one backend bound to one resource. It pulls work from the
//! provider, searches it, and submits whatever it finds, until its
//! cancellation token fires. Hash counts go to a [`HashSink`].

use crate::miner::backend::{NonceRange, SearchBackend, SearchContext};
use crate::miner::factory::Resource;
use crate::miner::work::Work;
use crate::network::{Requester, WorkProvider};
use crate::stats::HashSink;
use crate::utils::thread;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Search loop for one backend on one resource
pub struct Worker {
    resource: Resource,
    backend: Box<dyn SearchBackend>,
    provider: Arc<dyn WorkProvider>,
    sink: HashSink,
    cancel: CancellationToken,
    range: NonceRange,
}

impl Worker {
    /// Creates a new Worker instance
    ///
    /// # Arguments
    /// * `resource` - The resource `backend` is bound to
    /// * `backend` - The search implementation to drive
    /// * `provider` - Where work comes from and solutions go
    /// * `sink` - Receives hash counts
    /// * `cancel` - Stops the worker when cancelled
    pub fn new(
        resource: Resource,
        backend: Box<dyn SearchBackend>,
        provider: Arc<dyn WorkProvider>,
        sink: HashSink,
        cancel: CancellationToken,
    ) -> Self {
        Worker {
            resource,
            backend,
            provider,
            sink,
            cancel,
            range: NonceRange::FULL,
        }
    }

    /// Restricts every search to `range`
    pub fn with_range(mut self, range: NonceRange) -> Self {
        self.range = range;
        self
    }

    /// Starts the worker on its own OS thread
    ///
    /// The thread runs at the lowest scheduling priority and, for CPU
    /// resources, is pinned to its core.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        let name = format!("{}/{}", self.resource, self.backend.name());
        std::thread::Builder::new().name(name).spawn(move || {
            thread::lower_current_priority();
            if let Resource::Cpu { core } = self.resource {
                if !thread::pin_current_to_core(core) {
                    log::debug!("Could not pin worker to core {}", core);
                }
            }
            self.run();
        })
    }

    /// Pulls, searches and submits work until cancelled
    pub fn run(mut self) {
        let name = self.backend.name();
        let comment = self.resource.to_string();
        log::debug!("{} worker started on {}", name, comment);

        while !self.cancel.is_cancelled() {
            let Some(work) = self
                .provider
                .get_work(Requester::miner(name, &comment), &self.cancel)
            else {
                break;
            };

            let Some(solved) = self.search(work) else {
                continue;
            };
            if self.cancel.is_cancelled() {
                break;
            }
            if solved.is_stale() {
                log::debug!(
                    "{} on {} discarded nonce {:#010x} for stale block {}",
                    name,
                    comment,
                    solved.nonce(),
                    solved.block_number
                );
                continue;
            }

            log::info!(
                "{} on {} found nonce {:#010x} for block {}",
                name,
                comment,
                solved.nonce(),
                solved.block_number
            );
            let accepted =
                self.provider
                    .submit_work(&solved, Requester::miner(name, &comment), &self.cancel);
            if !self.cancel.is_cancelled() {
                self.sink.stats().record_submission(accepted);
            }
        }

        log::debug!("{} worker stopped on {}", name, comment);
    }

    /// Searches one work item; returns it with the solving nonce in place
    ///
    /// Gives up as soon as the worker is cancelled or the work goes stale.
    pub fn search(&mut self, mut work: Work) -> Option<Work> {
        let ctx = SearchContext::new(&work).with_range(self.range);
        let sink = &self.sink;
        let cancel = &self.cancel;
        let current = &work;

        let found = self.backend.search(current, &ctx, &mut |hashes| {
            sink.add(hashes);
            !cancel.is_cancelled() && !current.is_stale()
        })?;

        work.set_nonce(found);
        Some(work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::backend::ScalarBackend;
    use crate::miner::work::tests::{FIXTURE_NONCE, fixture_work};
    use crate::network::Pool;
    use crate::stats::HashRateStats;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// Hands out the same work every time and records submissions.
    struct FixedProvider {
        work: Work,
        served: AtomicUsize,
        submitted: Mutex<Vec<Work>>,
    }

    impl FixedProvider {
        fn new(work: Work) -> Arc<Self> {
            Arc::new(FixedProvider {
                work,
                served: AtomicUsize::new(0),
                submitted: Mutex::new(Vec::new()),
            })
        }
    }

    impl WorkProvider for FixedProvider {
        fn get_work(&self, _: Requester<'_>, cancel: &CancellationToken) -> Option<Work> {
            if cancel.is_cancelled() {
                return None;
            }
            self.served.fetch_add(1, Ordering::SeqCst);
            Some(self.work.clone())
        }

        fn submit_work(&self, work: &Work, _: Requester<'_>, _: &CancellationToken) -> bool {
            self.submitted.lock().push(work.clone());
            work.validate()
        }
    }

    fn worker_for(provider: Arc<FixedProvider>, cancel: CancellationToken) -> (Worker, Arc<HashRateStats>) {
        let stats = Arc::new(HashRateStats::new());
        let worker = Worker::new(
            Resource::Cpu { core: 0 },
            Box::new(ScalarBackend::new()),
            provider,
            HashSink::new(stats.clone()),
            cancel,
        );
        (worker, stats)
    }

    #[test]
    fn search_sets_solving_nonce() {
        let mut work = fixture_work();
        work.set_nonce(0);
        let provider = FixedProvider::new(work.clone());
        let (worker, stats) = worker_for(provider, CancellationToken::new());
        let mut worker = worker.with_range(NonceRange::new(FIXTURE_NONCE - 100, FIXTURE_NONCE + 100));

        let solved = worker.search(work).unwrap();
        assert_eq!(solved.nonce(), FIXTURE_NONCE);
        assert!(solved.validate());
        assert_eq!(stats.total_hash_count(), 101);
    }

    #[test]
    fn stale_work_is_abandoned() {
        let pool = Arc::new(
            Pool::new("http://127.0.0.1:1/", Duration::from_secs(1), Duration::from_secs(1)).unwrap(),
        );
        pool.set_current_block_number(1);
        let mut work = fixture_work();
        work.block_number = 1;
        work.origin = Some(pool.clone());

        let provider = FixedProvider::new(work.clone());
        let (worker, stats) = worker_for(provider, CancellationToken::new());
        let mut worker = worker.with_range(NonceRange::new(0, FIXTURE_NONCE - 1));

        let flipper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            pool.set_current_block_number(2);
        });

        let started = Instant::now();
        assert!(worker.search(work).is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(stats.total_hash_count() < u64::from(FIXTURE_NONCE));
        flipper.join().unwrap();
    }

    #[test]
    fn solutions_for_stale_work_are_not_submitted() {
        let pool = Arc::new(
            Pool::new("http://127.0.0.1:1/", Duration::from_secs(1), Duration::from_secs(1)).unwrap(),
        );
        pool.set_current_block_number(2);
        let mut work = fixture_work();
        work.set_nonce(0);
        work.block_number = 1;
        work.origin = Some(pool);

        let provider = FixedProvider::new(work);
        let cancel = CancellationToken::new();
        let (worker, stats) = worker_for(provider.clone(), cancel.clone());
        let handle = worker
            .with_range(NonceRange::new(FIXTURE_NONCE - 10, FIXTURE_NONCE))
            .spawn()
            .unwrap();

        let started = Instant::now();
        while provider.served.load(Ordering::SeqCst) < 5 && started.elapsed() < Duration::from_secs(10) {
            std::thread::sleep(Duration::from_millis(5));
        }
        cancel.cancel();
        handle.join().unwrap();

        assert!(provider.served.load(Ordering::SeqCst) >= 5);
        assert!(provider.submitted.lock().is_empty());
        assert_eq!(stats.snapshot().shares_accepted, 0);
        assert_eq!(stats.snapshot().shares_rejected, 0);
    }

    #[test]
    fn worker_submits_and_stops_on_cancel() {
        let mut work = fixture_work();
        work.set_nonce(0);
        let provider = FixedProvider::new(work);
        let cancel = CancellationToken::new();
        let (worker, stats) = worker_for(provider.clone(), cancel.clone());
        let handle = worker
            .with_range(NonceRange::new(FIXTURE_NONCE - 10, FIXTURE_NONCE))
            .spawn()
            .unwrap();

        let started = Instant::now();
        while provider.submitted.lock().len() < 2 && started.elapsed() < Duration::from_secs(10) {
            std::thread::sleep(Duration::from_millis(5));
        }
        cancel.cancel();
        handle.join().unwrap();

        let submitted = provider.submitted.lock();
        assert!(submitted.len() >= 2);
        assert!(submitted.iter().all(|w| w.nonce() == FIXTURE_NONCE));
        assert!(stats.snapshot().shares_accepted >= 1);
        assert!(provider.served.load(Ordering::SeqCst) >= 2);
    }
}
