// src/miner/backend/mod.rs
//! Nonce search backends
//!
//! Every backend searches the same thing: the nonce range of a
//! [`SearchContext`] for a header whose double SHA-256 meets the target.
//! The context holds everything that does not depend on the nonce, computed
//! once per [`Work`]; the backends differ only in how many nonces they push
//! through the remaining rounds at a time.

use crate::miner::sha256::{self, Block, State};
use crate::miner::work::{Target, Work};
use std::fmt;

/// Scalar reference backend
pub mod scalar;

/// Lane-parallel CPU backend
pub mod vectorized;

/// OpenCL GPU backend
#[cfg(feature = "opencl")]
pub mod opencl;

pub use scalar::ScalarBackend;
pub use vectorized::VectorBackend;

/// Number of hashes between two progress reports on CPU backends
pub const PROGRESS_INTERVAL: u64 = 1 << 16;

/// A nonce search implementation bound to one resource
///
/// Backends are created by a factory, moved onto their worker thread and
/// used there exclusively.
pub trait SearchBackend: Send {
    /// Short name used in logs and in the `X-ShaMiner-Miner` header
    fn name(&self) -> &'static str;

    /// Searches the context's nonce range for a solution
    ///
    /// `progress` receives the number of hashes computed since its previous
    /// call and is called at a bounded interval; returning `false` stops
    /// the search, which then returns `None`. The counts passed to it add
    /// up to exactly the number of nonces hashed.
    ///
    /// # Returns
    /// - `Some(nonce)` for the lowest solving nonce found
    /// - `None` when the range is exhausted or the search was stopped
    fn search(
        &mut self,
        work: &Work,
        ctx: &SearchContext,
        progress: &mut dyn FnMut(u64) -> bool,
    ) -> Option<u32>;
}

/// Inclusive range of nonces to search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NonceRange {
    /// First nonce
    pub first: u32,
    /// Last nonce, inclusive
    pub last: u32,
}

impl NonceRange {
    /// The whole 32-bit space
    pub const FULL: NonceRange = NonceRange {
        first: 0,
        last: u32::MAX,
    };

    /// Creates a range from `first` to `last` inclusive; empty if `first > last`
    pub fn new(first: u32, last: u32) -> Self {
        NonceRange { first, last }
    }

    /// `count` nonces starting at `first`, clamped to the nonce space
    pub fn starting_at(first: u32, count: u32) -> Self {
        if count == 0 {
            return NonceRange { first: 1, last: 0 };
        }
        NonceRange {
            first,
            last: first.saturating_add(count - 1),
        }
    }

    /// Number of nonces in the range
    pub fn len(&self) -> u64 {
        if self.first > self.last {
            0
        } else {
            u64::from(self.last - self.first) + 1
        }
    }

    /// Whether the range holds no nonce
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `nonce` lies inside the range
    pub fn contains(&self, nonce: u32) -> bool {
        self.first <= nonce && nonce <= self.last
    }
}

impl fmt::Display for NonceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}..={:#010x}", self.first, self.last)
    }
}

/// Nonce-independent state for one unit of work
#[derive(Clone, Debug)]
pub struct SearchContext {
    /// Hash state after the first 64-byte block of the header
    pub midstate: State,
    /// Second block with padding; word 3 is the nonce slot
    pub block2: Block,
    /// Working variables after rounds 0..3 of the second block
    pub prerolled: State,
    /// Schedule word 16 of the second block
    pub w16: u32,
    /// Schedule word 17 of the second block
    pub w17: u32,
    /// Second-hash block with padding for a 32-byte message
    pub hash_block: Block,
    /// Full target
    pub target: Target,
    /// Most significant 32 bits of the target, for the pre-filter
    pub target_hi: u32,
    /// Nonces to search
    pub range: NonceRange,
}

/// Index of the nonce word in the second block
pub const NONCE_WORD: usize = 3;

/// Rounds of the second block that do not depend on the nonce
pub const PREROLLED_ROUNDS: usize = 3;

impl SearchContext {
    /// Precomputes the search state for `work` over the full nonce range
    pub fn new(work: &Work) -> Self {
        let mut message = [0u8; 128];
        message[..80].copy_from_slice(&work.message());
        let block1 = sha256::prepare(&mut message, 80, 0);
        let mut block2 = sha256::prepare(&mut message, 80, 1);
        block2[NONCE_WORD] = 0;

        let midstate = sha256::transform(&sha256::H0, &block1);
        let w = sha256::schedule(&block2);

        let mut prerolled = midstate;
        for (r, word) in w.iter().enumerate().take(PREROLLED_ROUNDS) {
            sha256::round(&mut prerolled, *word, r);
        }

        SearchContext {
            midstate,
            block2,
            prerolled,
            w16: w[16],
            w17: w[17],
            hash_block: sha256::hash_block_template(),
            target: work.target,
            target_hi: work.target.top_word(),
            range: NonceRange::FULL,
        }
    }

    /// Narrows the search to `range`
    pub fn with_range(mut self, range: NonceRange) -> Self {
        self.range = range;
        self
    }

    /// Second block with `nonce` in place
    #[inline]
    pub fn block2_with(&self, nonce: u32) -> Block {
        let mut block = self.block2;
        block[NONCE_WORD] = nonce.swap_bytes();
        block
    }

    /// Full double SHA-256 state for `nonce`, two plain transforms
    pub fn hash(&self, nonce: u32) -> State {
        let first = sha256::transform(&self.midstate, &self.block2_with(nonce));
        let mut block = self.hash_block;
        block[..8].copy_from_slice(&first);
        sha256::transform(&sha256::H0, &block)
    }

    /// Cheap test on the last state word of the second hash
    #[inline(always)]
    pub fn passes_prefilter(&self, h7: u32) -> bool {
        h7.swap_bytes() <= self.target_hi
    }

    /// Full 256-bit comparison of the digest for `nonce` against the target
    pub fn confirm(&self, nonce: u32) -> bool {
        self.target.is_met_by(&sha256::finalize(&self.hash(nonce)))
    }
}

/// Batches hash counts into progress reports
pub(crate) struct Progress<'a> {
    callback: &'a mut dyn FnMut(u64) -> bool,
    pending: u64,
    interval: u64,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(callback: &'a mut dyn FnMut(u64) -> bool, interval: u64) -> Self {
        Progress {
            callback,
            pending: 0,
            interval,
        }
    }

    /// Adds `hashes`; reports once the interval is reached.
    /// Returns `false` if the search must stop.
    #[inline]
    pub(crate) fn add(&mut self, hashes: u64) -> bool {
        self.pending += hashes;
        if self.pending >= self.interval {
            self.flush()
        } else {
            true
        }
    }

    /// Reports whatever is pending.
    pub(crate) fn flush(&mut self) -> bool {
        if self.pending == 0 {
            return true;
        }
        let hashes = std::mem::take(&mut self.pending);
        (self.callback)(hashes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::miner::work::tests::{FIXTURE_NONCE, fixture_work};

    /// Runs `backend` over `range` of the fixture work, collecting reports.
    pub(crate) fn run_fixture(
        backend: &mut dyn SearchBackend,
        range: NonceRange,
    ) -> (Option<u32>, Vec<u64>) {
        let work = fixture_work();
        let ctx = SearchContext::new(&work).with_range(range);
        let mut reports = Vec::new();
        let found = backend.search(&work, &ctx, &mut |hashes| {
            reports.push(hashes);
            true
        });
        (found, reports)
    }

    /// Finds the fixture nonce and accounts for every hash before it.
    pub(crate) fn assert_finds_fixture(backend: &mut dyn SearchBackend) {
        let range = NonceRange::new(FIXTURE_NONCE - 200_000, FIXTURE_NONCE + 1000);
        let (found, reports) = run_fixture(backend, range);
        assert_eq!(found, Some(FIXTURE_NONCE));
        assert!(reports.iter().sum::<u64>() >= 200_001);
    }

    /// Exhausts a range without a solution and counts every nonce exactly.
    pub(crate) fn assert_exhausts(backend: &mut dyn SearchBackend) {
        let range = NonceRange::new(FIXTURE_NONCE - 150_003, FIXTURE_NONCE - 1);
        let (found, reports) = run_fixture(backend, range);
        assert_eq!(found, None);
        assert_eq!(reports.iter().sum::<u64>(), 150_003);
    }

    /// Stops at the first report when told to.
    pub(crate) fn assert_cancels(backend: &mut dyn SearchBackend) {
        assert_cancels_after(backend, 1, PROGRESS_INTERVAL);
    }

    /// Stops after exactly `calls` reports of at most `per_call` hashes each.
    pub(crate) fn assert_cancels_after(backend: &mut dyn SearchBackend, calls: usize, per_call: u64) {
        let work = fixture_work();
        let ctx = SearchContext::new(&work).with_range(NonceRange::new(0, FIXTURE_NONCE - 1));
        let mut reports = Vec::new();
        let found = backend.search(&work, &ctx, &mut |hashes| {
            assert!(hashes > 0);
            reports.push(hashes);
            reports.len() < calls
        });
        assert_eq!(found, None);
        assert_eq!(reports.len(), calls);
        assert!(reports.iter().sum::<u64>() <= calls as u64 * per_call);
    }

    #[test]
    fn context_hash_matches_work_digest() {
        let work = fixture_work();
        let ctx = SearchContext::new(&work);
        assert_eq!(sha256::finalize(&ctx.hash(FIXTURE_NONCE)), work.digest());
        assert!(ctx.confirm(FIXTURE_NONCE));
        assert!(!ctx.confirm(FIXTURE_NONCE - 1));
    }

    #[test]
    fn prerolled_state_resumes_first_hash() {
        let work = fixture_work();
        let ctx = SearchContext::new(&work);
        let w = sha256::schedule(&ctx.block2_with(FIXTURE_NONCE));

        assert_eq!(w[16], ctx.w16);
        assert_eq!(w[17], ctx.w17);
        assert_eq!(
            sha256::finish_rounds(&ctx.midstate, ctx.prerolled, &w, PREROLLED_ROUNDS),
            sha256::transform(&ctx.midstate, &ctx.block2_with(FIXTURE_NONCE))
        );
    }

    #[test]
    fn prefilter_admits_the_solution() {
        let work = fixture_work();
        let ctx = SearchContext::new(&work);
        assert_eq!(ctx.target_hi, 0);
        assert!(ctx.passes_prefilter(ctx.hash(FIXTURE_NONCE)[7]));
    }

    #[test]
    fn nonce_range_lengths() {
        assert_eq!(NonceRange::FULL.len(), 1 << 32);
        assert_eq!(NonceRange::new(5, 5).len(), 1);
        assert!(NonceRange::new(6, 5).is_empty());
        assert_eq!(NonceRange::starting_at(u32::MAX - 1, 10).len(), 2);
        assert!(NonceRange::starting_at(7, 0).is_empty());
        assert!(NonceRange::new(1, 3).contains(3));
    }

    #[test]
    fn progress_batches_and_flushes() {
        let mut seen = Vec::new();
        let mut callback = |h: u64| {
            seen.push(h);
            true
        };
        let mut progress = Progress::new(&mut callback, 10);
        for _ in 0..25 {
            assert!(progress.add(1));
        }
        assert!(progress.flush());
        assert!(progress.flush());
        drop(progress);
        assert_eq!(seen, vec![10, 10, 5]);
    }
}
