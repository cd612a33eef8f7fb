//! CDB hash function
//!
//! The classic djb "times 33" hash used by every cdb implementation:
//! start from 5381 and, for each byte, compute `((h << 5) + h) ^ byte`
//! with 32-bit wrapping arithmetic. The low 8 bits select one of the 256
//! bucket tables, the remaining bits select the first slot to probe.
//!
//! Changing any part of this module breaks compatibility with every
//! database already on disk.

use std::hash::Hasher;

use crate::format::TABLE_COUNT;

/// Initial hash state
pub const HASH_SEED: u32 = 5381;

/// Compute the CDB hash of a key
///
/// # Examples
///
/// ```
/// use hcdb::hash::hash;
///
/// assert_eq!(hash(b""), 5381);
/// assert_eq!(hash(b"a"), 177_604);
/// ```
pub fn hash(key: &[u8]) -> u32 {
    key.iter().fold(HASH_SEED, |h, &byte| step(h, byte))
}

#[inline]
fn step(h: u32, byte: u8) -> u32 {
    (h << 5).wrapping_add(h) ^ u32::from(byte)
}

/// Bucket table selected by a hash
#[inline]
pub fn bucket_of(hash: u32) -> usize {
    (hash as usize) % TABLE_COUNT
}

/// First slot probed for a hash in a table of `slots` entries
///
/// # Panics
///
/// Panics if `slots` is zero. Readers treat a zero-slot table as absent and
/// never probe it.
#[inline]
pub fn probe_start(hash: u32, slots: u32) -> u32 {
    (hash >> 8) % slots
}

/// Incremental CDB hasher
///
/// Feeding bytes in several `write` calls gives the same result as hashing
/// the concatenation at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdbHasher {
    state: u32,
}

impl CdbHasher {
    /// Create a hasher in its initial state
    pub fn new() -> Self {
        Self { state: HASH_SEED }
    }

    /// Current 32-bit hash value
    pub fn value(&self) -> u32 {
        self.state
    }

    /// Return to the initial state
    pub fn reset(&mut self) {
        self.state = HASH_SEED;
    }
}

impl Default for CdbHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for CdbHasher {
    fn finish(&self) -> u64 {
        u64::from(self.state)
    }

    fn write(&mut self, bytes: &[u8]) {
        self.state = bytes.iter().fold(self.state, |h, &byte| step(h, byte));
    }
}
