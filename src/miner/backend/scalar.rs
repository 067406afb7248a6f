// src/miner/backend/scalar.rs
//! Reference backend: one nonce at a time, two full transforms per nonce.

use super::{PROGRESS_INTERVAL, Progress, SearchBackend, SearchContext};
use crate::miner::work::Work;

/// Portable single-nonce searcher, available on every CPU core
#[derive(Debug, Default)]
pub struct ScalarBackend;

impl ScalarBackend {
    /// Creates a new scalar backend
    pub fn new() -> Self {
        ScalarBackend
    }
}

impl SearchBackend for ScalarBackend {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn search(
        &mut self,
        work: &Work,
        ctx: &SearchContext,
        progress: &mut dyn FnMut(u64) -> bool,
    ) -> Option<u32> {
        log::trace!("scalar search of block {} over {}", work.block_number, ctx.range);
        if ctx.range.is_empty() {
            return None;
        }

        let mut progress = Progress::new(progress, PROGRESS_INTERVAL);
        let mut nonce = ctx.range.first;
        loop {
            let state = ctx.hash(nonce);
            if ctx.passes_prefilter(state[7]) && ctx.confirm(nonce) {
                progress.add(1);
                progress.flush();
                return Some(nonce);
            }
            if !progress.add(1) {
                return None;
            }
            if nonce == ctx.range.last {
                break;
            }
            nonce += 1;
        }

        progress.flush();
        None
    }
}
