// src/miner/work.rs
//! Units of work handed out by a pool
//!
//! A [`Work`] carries the 80-byte block header in getwork wire order (every
//! 32-bit word written big-endian), the target it must be hashed under and
//! the pool it came from. The SHA-256 message is the header with each word
//! byte-swapped, so the search code loads words little-endian.

use crate::miner::sha256;
use crate::network::pool::Pool;
use crate::utils::MinerError;
use hex_literal::hex;
use std::fmt;
use std::sync::Arc;

/// Header length in bytes
pub const HEADER_SIZE: usize = 80;

/// Length of the getwork `data` field in bytes (header plus SHA padding)
pub const DATA_SIZE: usize = 128;

/// Byte offset of the nonce inside the header
pub const NONCE_OFFSET: usize = 76;

/// A solved header, reused as offline work for benchmarking
pub const BENCHMARK_HEADER: [u8; HEADER_SIZE] = hex!(
    "00000001d915b8fd2face61c6fe22ab76cad5f46c11cebab697dbd9e00000804"
    "000000008fe5f19cbdd55b40db93be7ef8ae249e0b21ec6e29c833b186404de0"
    "de205cc54e0022ac1a132185007d1adf"
);

/// Maximum acceptable hash, as the little-endian bytes of a 256-bit integer
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Target(pub [u8; 32]);

impl Target {
    /// Decodes a 64-character hex target as sent by the pool
    pub fn from_hex(s: &str) -> Result<Self, MinerError> {
        let bytes = hex::decode(s.trim())?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            MinerError::ProtocolError(format!("target must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Target(bytes))
    }

    /// Whether `digest` is at or below this target
    ///
    /// Both values are little-endian 256-bit integers, so the most
    /// significant byte sits at index 31.
    pub fn is_met_by(&self, digest: &[u8; 32]) -> bool {
        for i in (0..32).rev() {
            if digest[i] != self.0[i] {
                return digest[i] < self.0[i];
            }
        }
        true
    }

    /// Most significant 32 bits of the target
    pub fn top_word(&self) -> u32 {
        u32::from_le_bytes([self.0[28], self.0[29], self.0[30], self.0[31]])
    }

    /// Hex representation in wire order
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", self.to_hex())
    }
}

/// A block header to search, together with its target and origin
#[derive(Clone)]
pub struct Work {
    /// Chain height this work was issued for
    pub block_number: u32,
    /// Header in getwork wire order
    pub header: [u8; HEADER_SIZE],
    /// Acceptance threshold
    pub target: Target,
    /// Pool that issued the work; `None` for offline work
    pub origin: Option<Arc<Pool>>,
}

impl Work {
    /// Creates offline work with no issuing pool
    pub fn new(header: [u8; HEADER_SIZE], target: Target) -> Self {
        Work {
            block_number: 0,
            header,
            target,
            origin: None,
        }
    }

    /// Offline work that no nonce solves, for measuring raw hash rate
    pub fn benchmark() -> Self {
        let mut work = Work::new(BENCHMARK_HEADER, Target([0; 32]));
        work.set_nonce(0);
        work
    }

    /// Builds work from the `data`/`target` fields of a getwork response
    ///
    /// # Arguments
    /// * `data` - 256 hex characters; only the first 80 bytes are kept
    /// * `target` - 64 hex characters
    /// * `block_number` - height reported alongside the response
    /// * `origin` - pool the response came from
    pub fn from_getwork(
        data: &str,
        target: &str,
        block_number: u32,
        origin: Option<Arc<Pool>>,
    ) -> Result<Self, MinerError> {
        Ok(Work {
            block_number,
            header: decode_data(data)?,
            target: Target::from_hex(target)?,
            origin,
        })
    }

    /// Current nonce of the header
    pub fn nonce(&self) -> u32 {
        u32::from_be_bytes([
            self.header[NONCE_OFFSET],
            self.header[NONCE_OFFSET + 1],
            self.header[NONCE_OFFSET + 2],
            self.header[NONCE_OFFSET + 3],
        ])
    }

    /// Overwrites the nonce field of the header
    pub fn set_nonce(&mut self, nonce: u32) {
        self.header[NONCE_OFFSET..].copy_from_slice(&nonce.to_be_bytes());
    }

    /// The header as the byte string fed into SHA-256
    pub fn message(&self) -> [u8; HEADER_SIZE] {
        let mut message = self.header;
        for word in message.chunks_exact_mut(4) {
            word.reverse();
        }
        message
    }

    /// Double SHA-256 of the header
    pub fn digest(&self) -> [u8; 32] {
        sha256::double_sha256(&self.message())
    }

    /// Whether the header as it stands satisfies the target
    pub fn validate(&self) -> bool {
        self.target.is_met_by(&self.digest())
    }

    /// Whether the issuing pool has moved on to another block
    ///
    /// Offline work never goes stale.
    pub fn is_stale(&self) -> bool {
        self.origin
            .as_ref()
            .is_some_and(|pool| pool.current_block_number() != self.block_number)
    }

    /// The 128-byte `data` field for a submission, hex-encoded
    pub fn encode_data(&self) -> String {
        encode_data(&self.header)
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Work")
            .field("block_number", &self.block_number)
            .field("header", &hex::encode(self.header))
            .field("target", &self.target)
            .field("origin", &self.origin.as_ref().map(|p| p.to_string()))
            .finish()
    }
}

/// Decodes a getwork `data` field and keeps the header portion
pub fn decode_data(data: &str) -> Result<[u8; HEADER_SIZE], MinerError> {
    let bytes = hex::decode(data.trim())?;
    if bytes.len() != DATA_SIZE {
        return Err(MinerError::ProtocolError(format!(
            "data field must be {} bytes, got {}",
            DATA_SIZE,
            bytes.len()
        )));
    }
    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&bytes[..HEADER_SIZE]);
    Ok(header)
}

/// Re-pads a header to the 128-byte `data` layout and hex-encodes it
///
/// The padding is the SHA-256 padding of an 80-byte message, stored with
/// the same per-word byte order as the header.
pub fn encode_data(header: &[u8; HEADER_SIZE]) -> String {
    let mut message = [0u8; DATA_SIZE];
    message[..HEADER_SIZE].copy_from_slice(header);
    for word in message[..HEADER_SIZE].chunks_exact_mut(4) {
        word.reverse();
    }
    let _ = sha256::prepare(&mut message, HEADER_SIZE, 0);
    let _ = sha256::prepare(&mut message, HEADER_SIZE, 1);
    for word in message.chunks_exact_mut(4) {
        word.reverse();
    }
    hex::encode(message)
}
