// src/miner/backend/vectorized.rs
//! Lane-parallel CPU backend
//!
//! Hashes `L` consecutive nonces per step with every SHA-256 operation
//! applied across a `[u32; L]` lane array, a shape the compiler lowers to
//! SSE2/NEON (4 lanes) or AVX2 (8 lanes) registers. The first hash resumes
//! from the context's pre-rolled state and reuses W16/W17, so only rounds
//! 3..64 and schedule words 18..64 are computed per nonce.

use super::{NONCE_WORD, PREROLLED_ROUNDS, PROGRESS_INTERVAL, Progress, SearchBackend, SearchContext};
use crate::miner::sha256::{self, H0, K};
use crate::miner::work::Work;

type Lanes<const L: usize> = [u32; L];

/// SIMD-width nonce searcher
#[derive(Debug)]
pub struct VectorBackend {
    lanes: usize,
}

impl VectorBackend {
    /// Creates a backend hashing `lanes` nonces per step (4 or 8)
    pub fn new(lanes: usize) -> Self {
        VectorBackend {
            lanes: if lanes >= 8 { 8 } else { 4 },
        }
    }

    /// Nonces hashed per step
    pub fn lanes(&self) -> usize {
        self.lanes
    }
}

impl SearchBackend for VectorBackend {
    fn name(&self) -> &'static str {
        "vectorized"
    }

    fn search(
        &mut self,
        work: &Work,
        ctx: &SearchContext,
        progress: &mut dyn FnMut(u64) -> bool,
    ) -> Option<u32> {
        log::trace!(
            "{}-lane search of block {} over {}",
            self.lanes,
            work.block_number,
            ctx.range
        );
        match self.lanes {
            8 => search_lanes::<8>(ctx, progress),
            _ => search_lanes::<4>(ctx, progress),
        }
    }
}

fn search_lanes<const L: usize>(
    ctx: &SearchContext,
    progress: &mut dyn FnMut(u64) -> bool,
) -> Option<u32> {
    if ctx.range.is_empty() {
        return None;
    }

    let mut progress = Progress::new(progress, PROGRESS_INTERVAL);
    let mut remaining = ctx.range.len();
    let mut base = ctx.range.first;

    loop {
        let active = remaining.min(L as u64) as usize;
        let h7 = hash_step::<L>(ctx, base);

        for (lane, word) in h7.iter().enumerate().take(active) {
            let nonce = base.wrapping_add(lane as u32);
            if ctx.passes_prefilter(*word) && ctx.confirm(nonce) {
                progress.add(lane as u64 + 1);
                progress.flush();
                return Some(nonce);
            }
        }

        if !progress.add(active as u64) {
            return None;
        }
        remaining -= active as u64;
        if remaining == 0 {
            break;
        }
        base = base.wrapping_add(L as u32);
    }

    progress.flush();
    None
}

/// Last state word of the double hash for nonces `base..base + L`
#[inline(always)]
fn hash_step<const L: usize>(ctx: &SearchContext, base: u32) -> Lanes<L> {
    // First hash: resume block two after the pre-rolled rounds.
    let mut w = [[0u32; L]; 64];
    for (t, word) in ctx.block2.iter().enumerate() {
        w[t] = [*word; L];
    }
    w[NONCE_WORD] = std::array::from_fn(|lane| base.wrapping_add(lane as u32).swap_bytes());
    w[16] = [ctx.w16; L];
    w[17] = [ctx.w17; L];
    expand(&mut w, 18);

    let mut s = ctx.prerolled.map(|v| [v; L]);
    for (t, word) in w.iter().enumerate().skip(PREROLLED_ROUNDS) {
        round(&mut s, word, K[t]);
    }
    let first: [Lanes<L>; 8] = std::array::from_fn(|i| add(&s[i], ctx.midstate[i]));

    // Second hash over the 32-byte first digest.
    let mut w = [[0u32; L]; 64];
    w[..8].copy_from_slice(&first);
    for t in 8..16 {
        w[t] = [ctx.hash_block[t]; L];
    }
    expand(&mut w, 16);

    let mut s = H0.map(|v| [v; L]);
    for (t, word) in w.iter().enumerate() {
        round(&mut s, word, K[t]);
    }
    add(&s[7], H0[7])
}

#[inline(always)]
fn add<const L: usize>(lanes: &Lanes<L>, v: u32) -> Lanes<L> {
    std::array::from_fn(|i| lanes[i].wrapping_add(v))
}

#[inline(always)]
fn expand<const L: usize>(w: &mut [Lanes<L>; 64], from: usize) {
    for t in from..64 {
        for i in 0..L {
            w[t][i] = sha256::small_sigma1(w[t - 2][i])
                .wrapping_add(w[t - 7][i])
                .wrapping_add(sha256::small_sigma0(w[t - 15][i]))
                .wrapping_add(w[t - 16][i]);
        }
    }
}

#[inline(always)]
fn round<const L: usize>(s: &mut [Lanes<L>; 8], w: &Lanes<L>, k: u32) {
    let [a, b, c, d, e, f, g, h] = *s;
    let mut t1 = [0u32; L];
    let mut t2 = [0u32; L];
    for i in 0..L {
        t1[i] = h[i]
            .wrapping_add(sha256::big_sigma1(e[i]))
            .wrapping_add(sha256::ch(e[i], f[i], g[i]))
            .wrapping_add(k)
            .wrapping_add(w[i]);
        t2[i] = sha256::big_sigma0(a[i]).wrapping_add(sha256::maj(a[i], b[i], c[i]));
    }
    let new_a = std::array::from_fn(|i| t1[i].wrapping_add(t2[i]));
    let new_e = std::array::from_fn(|i| d[i].wrapping_add(t1[i]));
    *s = [new_a, a, b, c, new_e, e, f, g];
}
