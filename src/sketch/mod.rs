//! Probabilistic sketches
//!
//! Fixed-memory estimators over the admitted record stream:
//!
//! - [`HyperLogLog`]: distinct-count estimation
//! - [`CountMinSketch`]: per-key frequency estimation and heavy hitters
//! - [`BloomFilter`]: set membership with bounded false-positive rate
//!
//! The structs here are plain (`&mut self` updates); the query engine wraps
//! each in its own reader/writer lock.

pub mod hyperloglog;
pub mod countmin;
pub mod bloom;

pub use bloom::{BloomFilter, BloomStats, TimeWindowedBloom};
pub use countmin::{CountMinSketch, CountMinStats, HeavyHitter};
pub use hyperloglog::{HyperLogLog, HyperLogLogStats};

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

/// 64-bit hash over raw bytes
///
/// `DefaultHasher::new()` uses fixed keys, so the hash is stable across runs;
/// sketch contents are reproducible for a given stream.
pub(crate) fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write(data);
    hasher.finish()
}

/// Seeded variant used where a second independent hash is needed
pub(crate) fn hash_bytes_seeded(data: &[u8], seed: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write_u64(seed);
    hasher.write(data);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash_bytes(b"key"), hash_bytes(b"key"));
        assert_ne!(hash_bytes(b"key-a"), hash_bytes(b"key-b"));
    }

    #[test]
    fn test_seeded_hash_independent() {
        let h1 = hash_bytes(b"key");
        let h2 = hash_bytes_seeded(b"key", 0x9E37_79B9_7F4A_7C15);
        assert_ne!(h1, h2);
    }
}
