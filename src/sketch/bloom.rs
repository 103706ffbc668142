//! Bloom membership filter
//!
//! Bit vector with `k` probe positions per key derived by double hashing.
//! A key that was added is always reported present; a key that was not may
//! be reported present with probability `(1 - e^(-kn/m))^k`.

use serde::{Deserialize, Serialize};

use super::{hash_bytes, hash_bytes_seeded};
use crate::error::SketchError;

const H2_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Probabilistic set-membership filter with no false negatives
#[derive(Debug, Clone)]
pub struct BloomFilter {
    /// Bit storage, 64 bits per word
    words: Vec<u64>,

    /// Filter size in bits
    size: usize,

    /// Probe positions per key
    num_hashes: usize,

    /// Keys added since construction or clear
    inserted: u64,
}

impl BloomFilter {
    /// Create a filter with `size` bits and `num_hashes` probes per key
    pub fn new(size: usize, num_hashes: usize) -> Self {
        let words = vec![0u64; size.div_ceil(64)];
        Self {
            words,
            size,
            num_hashes,
            inserted: 0,
        }
    }

    /// Size the filter for an expected item count and target false-positive rate
    ///
    /// `m = -n * ln(p) / ln(2)^2`, `k = (m/n) * ln(2)`, with k at least 1.
    pub fn with_optimal_params(expected_items: usize, false_positive_rate: f64) -> Self {
        let ln2 = std::f64::consts::LN_2;
        let size = (-(expected_items as f64) * false_positive_rate.ln() / (ln2 * ln2)) as usize;
        let num_hashes = ((size as f64 / expected_items as f64) * ln2) as usize;

        Self::new(size.max(1), num_hashes.max(1))
    }

    /// Filter size in bits
    pub fn size(&self) -> usize {
        self.size
    }

    /// Probe positions per key
    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Keys added so far
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    // Double hashing: position i is h1 + i*h2 with h2 forced odd so the
    // probe sequence covers the bit space.
    fn positions(&self, data: &[u8]) -> impl Iterator<Item = usize> + '_ {
        let h1 = hash_bytes(data);
        let h2 = hash_bytes_seeded(data, H2_SEED) | 1;
        let size = self.size as u64;

        (0..self.num_hashes as u64)
            .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % size) as usize)
    }

    #[inline]
    fn set_bit(&mut self, index: usize) {
        self.words[index / 64] |= 1u64 << (index % 64);
    }

    #[inline]
    fn get_bit(&self, index: usize) -> bool {
        self.words[index / 64] & (1u64 << (index % 64)) != 0
    }

    /// Add a key to the filter
    pub fn add(&mut self, data: &[u8]) {
        let positions: Vec<usize> = self.positions(data).collect();
        for index in positions {
            self.set_bit(index);
        }
        self.inserted += 1;
    }

    /// Test whether a key is (probably) present
    ///
    /// A `false` answer is definitive.
    pub fn contains(&self, data: &[u8]) -> bool {
        self.positions(data).all(|index| self.get_bit(index))
    }

    /// Union another filter into this one
    ///
    /// After the union, `contains` holds whenever either input would have
    /// reported the key present.
    ///
    /// # Errors
    ///
    /// Returns [`SketchError::ParameterMismatch`] when size or hash count
    /// differ.
    pub fn union(&mut self, other: &BloomFilter) -> Result<(), SketchError> {
        if self.size != other.size || self.num_hashes != other.num_hashes {
            return Err(SketchError::ParameterMismatch);
        }

        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            *mine |= *theirs;
        }

        self.inserted += other.inserted;
        Ok(())
    }

    /// Zero all bits and the insert count
    pub fn clear(&mut self) {
        self.words.fill(0);
        self.inserted = 0;
    }

    /// Current false-positive probability: `(1 - e^(-kn/m))^k`
    pub fn false_positive_rate(&self) -> f64 {
        if self.inserted == 0 {
            return 0.0;
        }

        let k = self.num_hashes as f64;
        let n = self.inserted as f64;
        let m = self.size as f64;

        (1.0 - (-k * n / m).exp()).powf(k)
    }

    /// Estimate distinct items from bit saturation: `-(m/k) * ln(1 - x/m)`
    pub fn estimate_items(&self) -> u64 {
        let set_bits = self.count_set_bits();
        if set_bits == 0 {
            return 0;
        }

        let m = self.size as f64;
        let k = self.num_hashes as f64;
        let x = set_bits as f64;

        (-(m / k) * (1.0 - x / m).ln()) as u64
    }

    fn count_set_bits(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Saturation snapshot
    pub fn stats(&self) -> BloomStats {
        let set_bits = self.count_set_bits();

        BloomStats {
            size: self.size,
            num_hashes: self.num_hashes,
            inserted: self.inserted,
            set_bits,
            load_factor: set_bits as f64 / self.size as f64,
            false_positive_rate: self.false_positive_rate(),
            estimated_items: self.estimate_items(),
        }
    }
}

/// Filter saturation snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomStats {
    /// Filter size in bits
    pub size: usize,
    /// Probes per key
    pub num_hashes: usize,
    /// Keys added
    pub inserted: u64,
    /// Bits currently set
    pub set_bits: usize,
    /// set_bits / size
    pub load_factor: f64,
    /// Current false-positive probability
    pub false_positive_rate: f64,
    /// Distinct-item estimate from saturation
    pub estimated_items: u64,
}

// ============================================================================
// Time-Windowed Variant
// ============================================================================

/// Rotating ring of filters covering the last `W` time windows
///
/// Adds land in the current filter; membership consults all of them, so a
/// key stays visible for `W` rotations after its last add.
#[derive(Debug, Clone)]
pub struct TimeWindowedBloom {
    filters: Vec<BloomFilter>,
    current: usize,
}

impl TimeWindowedBloom {
    /// Create a ring of `windows` filters of identical shape
    pub fn new(windows: usize, size: usize, num_hashes: usize) -> Self {
        let windows = windows.max(1);
        Self {
            filters: (0..windows).map(|_| BloomFilter::new(size, num_hashes)).collect(),
            current: 0,
        }
    }

    /// Number of windows in the ring
    pub fn windows(&self) -> usize {
        self.filters.len()
    }

    /// Add a key to the current window
    pub fn add(&mut self, data: &[u8]) {
        self.filters[self.current].add(data);
    }

    /// Test membership across all windows
    pub fn contains(&self, data: &[u8]) -> bool {
        self.filters.iter().any(|f| f.contains(data))
    }

    /// Advance to the next window, clearing its previous contents
    pub fn rotate(&mut self) {
        self.current = (self.current + 1) % self.filters.len();
        self.filters[self.current].clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let mut bloom = BloomFilter::new(10_000, 5);

        for i in 0..500 {
            bloom.add(format!("key-{}", i).as_bytes());
        }

        for i in 0..500 {
            assert!(bloom.contains(format!("key-{}", i).as_bytes()));
        }
        assert_eq!(bloom.inserted(), 500);
    }

    #[test]
    fn test_false_positive_rate_bounded() {
        let mut bloom = BloomFilter::new(100_000, 5);
        for i in 0..5000 {
            bloom.add(format!("key-{}", i).as_bytes());
        }

        let fpr = bloom.false_positive_rate();
        assert!(fpr > 0.0 && fpr < 0.05, "fpr {}", fpr);

        // Empirical check: unseen keys mostly absent.
        let mut false_positives = 0;
        let trials = 2000;
        for i in 0..trials {
            if bloom.contains(format!("unseen-{}", i).as_bytes()) {
                false_positives += 1;
            }
        }
        let observed = false_positives as f64 / trials as f64;
        assert!(observed < fpr * 5.0 + 0.01, "observed {}", observed);
    }

    #[test]
    fn test_with_optimal_params() {
        let bloom = BloomFilter::with_optimal_params(10_000, 0.01);

        // ~9.6 bits per item and ~7 hashes for a 1% target.
        assert!(bloom.size() > 90_000 && bloom.size() < 100_000);
        assert!(bloom.num_hashes() >= 6 && bloom.num_hashes() <= 7);
    }

    #[test]
    fn test_union() {
        let mut a = BloomFilter::new(10_000, 5);
        let mut b = BloomFilter::new(10_000, 5);

        a.add(b"only-in-a");
        b.add(b"only-in-b");

        a.union(&b).unwrap();
        assert!(a.contains(b"only-in-a"));
        assert!(a.contains(b"only-in-b"));
        assert_eq!(a.inserted(), 2);
    }

    #[test]
    fn test_union_idempotent_bits() {
        let mut a = BloomFilter::new(1000, 3);
        for i in 0..50 {
            a.add(format!("key-{}", i).as_bytes());
        }

        let snapshot = a.clone();
        a.union(&snapshot).unwrap();

        // Self-union changes no bits.
        assert_eq!(a.words, snapshot.words);
        assert_eq!(a.count_set_bits(), snapshot.count_set_bits());
    }

    #[test]
    fn test_union_parameter_mismatch() {
        let mut a = BloomFilter::new(1000, 3);
        let b = BloomFilter::new(1000, 4);
        assert!(matches!(a.union(&b), Err(SketchError::ParameterMismatch)));
    }

    #[test]
    fn test_clear() {
        let mut bloom = BloomFilter::new(1000, 3);
        bloom.add(b"key");
        bloom.clear();

        assert!(!bloom.contains(b"key"));
        assert_eq!(bloom.inserted(), 0);
        assert_eq!(bloom.false_positive_rate(), 0.0);
    }

    #[test]
    fn test_estimate_items() {
        let mut bloom = BloomFilter::new(100_000, 5);
        for i in 0..3000 {
            bloom.add(format!("key-{}", i).as_bytes());
        }

        let estimate = bloom.estimate_items();
        assert!(
            (2700..=3300).contains(&estimate),
            "estimate {}",
            estimate
        );
    }

    #[test]
    fn test_windowed_add_and_contains() {
        let mut windowed = TimeWindowedBloom::new(3, 10_000, 4);

        windowed.add(b"early");
        windowed.rotate();
        windowed.add(b"late");

        // Both windows are consulted.
        assert!(windowed.contains(b"early"));
        assert!(windowed.contains(b"late"));
    }

    #[test]
    fn test_windowed_rotation_expires() {
        let mut windowed = TimeWindowedBloom::new(3, 10_000, 4);

        windowed.add(b"old-key");

        // After W rotations the window holding the key has been cleared.
        windowed.rotate();
        windowed.rotate();
        windowed.rotate();

        assert!(!windowed.contains(b"old-key"));
    }
}
