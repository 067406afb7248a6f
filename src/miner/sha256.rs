// src/miner/sha256.rs
//! SHA-256 primitives for the fixed shapes used in mining
//!
//! The compression function works on 32-bit words. Bytes enter through
//! [`prepare`] (padding plus big-endian word loads) and leave through
//! [`finalize`], so every backend shares one consistent word order. The
//! individual pieces (`schedule`, `round`) are exposed because the search
//! backends pre-roll the nonce-independent part of the second header block.

/// Minimum amount of bytes required for SHA-256 padding (`0x80` + length).
pub const MIN_PAD_SIZE: usize = 1 + 8;

/// Length of a SHA-256 input block in bytes.
pub const BLOCK_SIZE: usize = 64;

/// Length of the SHA-256 state in words.
pub const STATE_SIZE: usize = 8;

/// Length of a SHA-256 hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Eight-word hash state.
pub type State = [u32; STATE_SIZE];

/// One 64-byte input block as sixteen working words.
pub type Block = [u32; 16];

/// Expanded 64-word message schedule.
pub type Schedule = [u32; 64];

/// Round constants.
pub const K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

/// Initial hash value.
pub const H0: State = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Choose: bits of `y` where `x` is set, bits of `z` elsewhere.
#[inline(always)]
pub fn ch(x: u32, y: u32, z: u32) -> u32 {
    z ^ (x & (y ^ z))
}

/// Majority of the three inputs, bit by bit.
#[inline(always)]
pub fn maj(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (z & (x | y))
}

/// Σ0, applied to working variable `a` each round.
#[inline(always)]
pub fn big_sigma0(x: u32) -> u32 {
    x.rotate_right(2) ^ x.rotate_right(13) ^ x.rotate_right(22)
}

/// Σ1, applied to working variable `e` each round.
#[inline(always)]
pub fn big_sigma1(x: u32) -> u32 {
    x.rotate_right(6) ^ x.rotate_right(11) ^ x.rotate_right(25)
}

/// σ0 of the message schedule.
#[inline(always)]
pub fn small_sigma0(x: u32) -> u32 {
    x.rotate_right(7) ^ x.rotate_right(18) ^ (x >> 3)
}

/// σ1 of the message schedule.
#[inline(always)]
pub fn small_sigma1(x: u32) -> u32 {
    x.rotate_right(17) ^ x.rotate_right(19) ^ (x >> 10)
}

/// Total length of the padded message for `data_len` bytes of input.
pub fn padded_len(data_len: usize) -> usize {
    (data_len + MIN_PAD_SIZE).div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Number of 64-byte blocks in the padded message.
pub fn block_count(data_len: usize) -> usize {
    padded_len(data_len) / BLOCK_SIZE
}

/// Allocates a zeroed buffer large enough for `data_len` bytes plus padding.
pub fn allocate_input_buffer(data_len: usize) -> Vec<u8> {
    vec![0u8; padded_len(data_len)]
}

/// Writes the SHA-256 padding that falls inside block `block_index` of
/// `buffer` and returns that block as working words.
///
/// `buffer` holds the whole message (`data_len` bytes of data followed by
/// room for padding). Bytes before `data_len` are left untouched. The `0x80`
/// marker and the zero fill may land in a different block than the length
/// field, so every block of the message must be prepared before hashing.
///
/// # Panics
/// Panics if `buffer` is not exactly [`padded_len`]`(data_len)` long or
/// `block_index` is past the end of the message.
pub fn prepare(buffer: &mut [u8], data_len: usize, block_index: usize) -> Block {
    let total = padded_len(data_len);
    assert_eq!(buffer.len(), total, "buffer is not of the padded size");
    assert!(block_index < total / BLOCK_SIZE, "block index out of range");

    let start = block_index * BLOCK_SIZE;
    let length_at = total - 8;
    let bit_len = (data_len as u64).wrapping_mul(8).to_be_bytes();

    for i in start.max(data_len)..start + BLOCK_SIZE {
        buffer[i] = if i == data_len {
            0x80
        } else if i >= length_at {
            bit_len[i - length_at]
        } else {
            0
        };
    }

    let mut block = [0u8; BLOCK_SIZE];
    block.copy_from_slice(&buffer[start..start + BLOCK_SIZE]);
    words_from_be(&block)
}

/// Loads sixteen big-endian words.
pub fn words_from_be(bytes: &[u8; BLOCK_SIZE]) -> Block {
    let mut words = [0u32; 16];
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

/// Reverses the byte order of every word in place.
pub fn swap_words(words: &mut [u32]) {
    for word in words {
        *word = word.swap_bytes();
    }
}

/// Expands a block into the full message schedule.
pub fn schedule(block: &Block) -> Schedule {
    let mut w = [0u32; 64];
    w[..16].copy_from_slice(block);
    for i in 16..64 {
        w[i] = small_sigma1(w[i - 2])
            .wrapping_add(w[i - 7])
            .wrapping_add(small_sigma0(w[i - 15]))
            .wrapping_add(w[i - 16]);
    }
    w
}

/// Applies round `r` to the working variables `s` (a..h).
#[inline(always)]
pub fn round(s: &mut State, w: u32, r: usize) {
    let [a, b, c, d, e, f, g, h] = *s;
    let t1 = h
        .wrapping_add(big_sigma1(e))
        .wrapping_add(ch(e, f, g))
        .wrapping_add(K[r])
        .wrapping_add(w);
    let t2 = big_sigma0(a).wrapping_add(maj(a, b, c));
    *s = [t1.wrapping_add(t2), a, b, c, d.wrapping_add(t1), e, f, g];
}

/// Runs rounds `from..64` over `working` and adds the result to `state`.
///
/// With `from == 0` and `working == state` this is the plain compression
/// function; larger `from` values resume from a pre-rolled working state.
pub fn finish_rounds(state: &State, mut working: State, w: &Schedule, from: usize) -> State {
    for (r, word) in w.iter().enumerate().skip(from) {
        round(&mut working, *word, r);
    }
    let mut out = *state;
    for (o, v) in out.iter_mut().zip(working) {
        *o = o.wrapping_add(v);
    }
    out
}

/// One application of the SHA-256 compression function.
pub fn transform(state: &State, block: &Block) -> State {
    finish_rounds(state, *state, &schedule(block), 0)
}

/// Serializes the state into a digest (big-endian words).
pub fn finalize(state: &State) -> [u8; HASH_SIZE] {
    let mut out = [0u8; HASH_SIZE];
    for (chunk, word) in out.chunks_exact_mut(4).zip(state) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    out
}

/// SHA-256 of an arbitrary message, built from the primitives above.
pub fn digest(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut buffer = allocate_input_buffer(data.len());
    buffer[..data.len()].copy_from_slice(data);

    let mut state = H0;
    for index in 0..block_count(data.len()) {
        let block = prepare(&mut buffer, data.len(), index);
        state = transform(&state, &block);
    }
    finalize(&state)
}

/// SHA-256 applied twice.
pub fn double_sha256(data: &[u8]) -> [u8; HASH_SIZE] {
    digest(&digest(data))
}

/// Second-hash block for a 32-byte first digest: the digest occupies words
/// 0..8, words 8..16 hold the fixed padding for a 256-bit message.
pub fn hash_block_template() -> Block {
    let mut block = [0u32; 16];
    block[8] = 0x8000_0000;
    block[15] = (HASH_SIZE as u32) * 8;
    block
}
