// src/network/source.rs
//! Work source over one or more getwork pools
//!
//! Worker threads are plain OS threads, so the [`WorkProvider`] interface is
//! blocking. [`WorkSource`] owns a small tokio runtime and drives the async
//! [`Pool`] calls on it with `block_on`, racing each call against the
//! caller's cancellation token.

use crate::miner::work::Work;
use crate::network::pool::{Pool, Requester};
use crate::utils::MinerError;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Blocking interface between the scheduler's workers and a work supply
pub trait WorkProvider: Send + Sync {
    /// Called by the scheduler when a session starts
    fn start_session(&self, _cancel: &CancellationToken) {}

    /// Called by the scheduler when a session ends, after all workers joined
    fn stop_session(&self) {}

    /// Blocks until work is available or `cancel` fires
    fn get_work(&self, requester: Requester<'_>, cancel: &CancellationToken) -> Option<Work>;

    /// Submits a solved work item; `true` if it was accepted
    fn submit_work(
        &self,
        work: &Work,
        requester: Requester<'_>,
        cancel: &CancellationToken,
    ) -> bool;
}

/// Timing knobs for [`WorkSource`]
#[derive(Debug, Clone, Copy)]
pub struct SourceSettings {
    /// Bound on every getwork/submit POST
    pub request_timeout: Duration,
    /// Bound on every long-poll GET
    pub long_poll_timeout: Duration,
    /// Delay after a full failed cycle over the pools, and between
    /// submission retries
    pub retry_delay: Duration,
    /// Block-number refresh period for pools without long polling
    pub refresh_interval: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            request_timeout: Duration::from_secs(60),
            long_poll_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(5),
            refresh_interval: Duration::from_secs(15),
        }
    }
}

struct Session {
    cancel: CancellationToken,
    watchers: Vec<JoinHandle<()>>,
}

/// Fail-over getwork client over the configured pools
pub struct WorkSource {
    runtime: Runtime,
    pools: Vec<Arc<Pool>>,
    settings: SourceSettings,
    session: Mutex<Option<Session>>,
}

impl WorkSource {
    /// Creates a source over `urls`, tried in the given order
    ///
    /// # Errors
    /// Returns [`MinerError::ConfigError`] if `urls` is empty or any URL is
    /// unusable, or an I/O error if the runtime cannot start.
    pub fn new(urls: &[String], settings: SourceSettings) -> Result<Self, MinerError> {
        if urls.is_empty() {
            return Err(MinerError::ConfigError("No pools configured".to_string()));
        }
        let pools = urls
            .iter()
            .map(|url| {
                Pool::new(url, settings.request_timeout, settings.long_poll_timeout).map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("work-source")
            .enable_all()
            .build()?;

        Ok(WorkSource {
            runtime,
            pools,
            settings,
            session: Mutex::new(None),
        })
    }

    /// Configured pools, in fail-over order
    pub fn pools(&self) -> &[Arc<Pool>] {
        &self.pools
    }

    /// Runs `future` on the runtime unless `cancel` fires first
    fn run<T>(
        &self,
        cancel: &CancellationToken,
        future: impl Future<Output = Result<T, MinerError>>,
    ) -> Result<T, MinerError> {
        self.runtime.block_on(async {
            tokio::select! {
                _ = cancel.cancelled() => Err(MinerError::Cancelled),
                result = future => result,
            }
        })
    }

    /// Sleeps for `delay`; returns `false` if cancelled first
    fn pause(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        self.run(cancel, async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .is_ok()
    }
}

impl WorkProvider for WorkSource {
    fn start_session(&self, cancel: &CancellationToken) {
        let mut session = self.session.lock();
        if session.is_some() {
            return;
        }
        let cancel = cancel.child_token();
        let watchers = self
            .pools
            .iter()
            .map(|pool| {
                self.runtime
                    .spawn(watch(Arc::clone(pool), cancel.clone(), self.settings))
            })
            .collect();
        *session = Some(Session { cancel, watchers });
    }

    fn stop_session(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };
        session.cancel.cancel();
        self.runtime.block_on(async {
            for watcher in session.watchers {
                if let Err(e) = watcher.await {
                    log::warn!("Pool watcher ended abnormally: {}", MinerError::from(e));
                }
            }
        });
    }

    fn get_work(&self, requester: Requester<'_>, cancel: &CancellationToken) -> Option<Work> {
        loop {
            for pool in &self.pools {
                match self.run(cancel, pool.get_work_rpc(requester)) {
                    Ok(work) => return Some(work),
                    Err(MinerError::Cancelled) => return None,
                    Err(e) => log::warn!("getwork from {} failed: {}", pool, e),
                }
            }
            log::warn!(
                "All pools failed, retrying in {}s",
                self.settings.retry_delay.as_secs_f32()
            );
            if !self.pause(self.settings.retry_delay, cancel) {
                return None;
            }
        }
    }

    fn submit_work(
        &self,
        work: &Work,
        requester: Requester<'_>,
        cancel: &CancellationToken,
    ) -> bool {
        let Some(pool) = work.origin.as_ref() else {
            log::warn!("Dropping solution for offline work {:?}", work);
            return false;
        };

        if !work.validate() {
            log::error!(
                "INVALID: {:>10} {} digest {}",
                requester.miner.unwrap_or("-"),
                hex::encode(work.header),
                hex::encode(work.digest())
            );
        }

        loop {
            match self.run(cancel, pool.submit_work(work, requester)) {
                Ok(accepted) => return accepted,
                Err(MinerError::Cancelled) => return false,
                Err(e) => {
                    log::warn!(
                        "Submitting to {} failed: {}; retrying in {}s",
                        pool,
                        e,
                        self.settings.retry_delay.as_secs_f32()
                    );
                    if !self.pause(self.settings.retry_delay, cancel) {
                        return false;
                    }
                }
            }
        }
    }
}

impl Drop for WorkSource {
    fn drop(&mut self) {
        self.stop_session();
    }
}

/// Keeps a pool's block number current for the length of a session
///
/// Long-polls while the server advertises an endpoint, otherwise refreshes
/// with a plain getwork every `refresh_interval`.
async fn watch(pool: Arc<Pool>, cancel: CancellationToken, settings: SourceSettings) {
    let requester = Requester {
        miner: None,
        comment: "block watcher",
    };

    while !cancel.is_cancelled() {
        let (result, wait) = if pool.long_poll_url().is_some() {
            let result = pool.long_poll(requester, &cancel).await.map(|_| ());
            (result, Duration::ZERO)
        } else {
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(MinerError::Cancelled),
                result = pool.get_work_rpc(requester) => result.map(|_| ()),
            };
            (result, settings.refresh_interval)
        };

        let wait = match result {
            Ok(()) => wait,
            Err(MinerError::Cancelled) => break,
            Err(e) => {
                log::debug!("{}: block refresh failed: {}", pool, e);
                settings.retry_delay
            }
        };

        if !wait.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
    log::debug!("{}: watcher stopped", pool);
}
