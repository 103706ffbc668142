//! HyperLogLog cardinality sketch
//!
//! Estimates the number of distinct keys in a stream with fixed memory.
//! Precision `p` allocates `m = 2^p` one-byte registers; the relative
//! standard error of the estimate is `1.04 / sqrt(m)`, so the default
//! precision of 14 gives roughly 0.8% error in 16 KiB.

use serde::{Deserialize, Serialize};

use super::hash_bytes;
use crate::error::SketchError;

/// Default precision when an out-of-range value is requested
pub const DEFAULT_PRECISION: u8 = 14;

/// Fixed-memory distinct-count estimator
#[derive(Debug, Clone)]
pub struct HyperLogLog {
    /// Precision: number of hash bits used for register indexing
    precision: u8,

    /// Register count, `2^precision`
    m: u32,

    /// One register per index, holding the max observed rank
    registers: Vec<u8>,

    /// Bias-correction constant for this register count
    alpha: f64,
}

impl HyperLogLog {
    /// Create a sketch with the given precision
    ///
    /// Precisions outside [4, 16] fall back to [`DEFAULT_PRECISION`].
    pub fn new(precision: u8) -> Self {
        let precision = if (4..=16).contains(&precision) {
            precision
        } else {
            DEFAULT_PRECISION
        };

        let m = 1u32 << precision;
        Self {
            precision,
            m,
            registers: vec![0u8; m as usize],
            alpha: alpha_for(m),
        }
    }

    /// Precision this sketch was built with
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Observe a key
    pub fn add(&mut self, data: &[u8]) {
        let hash = hash_bytes(data);

        // Top `precision` bits select the register.
        let index = (hash >> (64 - self.precision)) as usize;

        // Rank of the remaining bits: position of the leading one, 1-based.
        // All-zero remainder saturates at the register width + 1.
        let rest = hash << self.precision;
        let rank = if rest == 0 {
            64 - self.precision + 1
        } else {
            rest.leading_zeros() as u8 + 1
        };

        if rank > self.registers[index] {
            self.registers[index] = rank;
        }
    }

    /// Estimate the number of distinct keys observed
    pub fn count(&self) -> u64 {
        let mut sum = 0.0f64;
        let mut empty = 0u32;

        for &register in &self.registers {
            if register == 0 {
                empty += 1;
            }
            sum += 2f64.powi(-(register as i32));
        }

        let m = self.m as f64;
        let mut estimate = self.alpha * m * m / sum;

        // Small-range correction: linear counting while registers are sparse.
        if estimate <= 2.5 * m && empty > 0 {
            estimate = m * (m / empty as f64).ln();
        }

        // Large-range correction near the 32-bit hash-collision regime.
        let two_pow_32 = 2f64.powi(32);
        if estimate > two_pow_32 / 30.0 {
            estimate = -two_pow_32 * (1.0 - estimate / two_pow_32).ln();
        }

        estimate as u64
    }

    /// Expected relative standard error: `1.04 / sqrt(m)`
    pub fn estimated_error(&self) -> f64 {
        1.04 / (self.m as f64).sqrt()
    }

    /// Merge another sketch into this one
    ///
    /// # Errors
    ///
    /// Returns [`SketchError::PrecisionMismatch`] when precisions differ.
    pub fn merge(&mut self, other: &HyperLogLog) -> Result<(), SketchError> {
        if self.precision != other.precision {
            return Err(SketchError::PrecisionMismatch {
                self_precision: self.precision,
                other_precision: other.precision,
            });
        }

        for (mine, theirs) in self.registers.iter_mut().zip(&other.registers) {
            if *theirs > *mine {
                *mine = *theirs;
            }
        }

        Ok(())
    }

    /// Zero all registers
    pub fn clear(&mut self) {
        self.registers.fill(0);
    }

    /// Snapshot of register occupancy
    pub fn stats(&self) -> HyperLogLogStats {
        let mut empty = 0u32;
        let mut max_register = 0u8;

        for &register in &self.registers {
            if register == 0 {
                empty += 1;
            }
            if register > max_register {
                max_register = register;
            }
        }

        HyperLogLogStats {
            precision: self.precision,
            registers: self.m,
            empty_registers: empty,
            max_register,
            estimated_error: self.estimated_error(),
        }
    }
}

/// Register occupancy snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperLogLogStats {
    /// Configured precision
    pub precision: u8,
    /// Total registers
    pub registers: u32,
    /// Registers still zero
    pub empty_registers: u32,
    /// Largest rank observed
    pub max_register: u8,
    /// Expected relative standard error
    pub estimated_error: f64,
}

/// Standard bias constant; tabulated for small m
fn alpha_for(m: u32) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / m as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sketch() {
        let hll = HyperLogLog::new(14);
        assert_eq!(hll.count(), 0);
    }

    #[test]
    fn test_precision_fallback() {
        assert_eq!(HyperLogLog::new(2).precision(), DEFAULT_PRECISION);
        assert_eq!(HyperLogLog::new(20).precision(), DEFAULT_PRECISION);
        assert_eq!(HyperLogLog::new(10).precision(), 10);
    }

    #[test]
    fn test_small_cardinality_exact() {
        let mut hll = HyperLogLog::new(14);
        for i in 0..100 {
            hll.add(format!("key-{}", i).as_bytes());
        }

        // Linear counting regime: essentially exact at this scale.
        let estimate = hll.count();
        assert!((95..=105).contains(&estimate), "estimate {}", estimate);
    }

    #[test]
    fn test_estimate_within_error_bound() {
        let mut hll = HyperLogLog::new(14);
        let n = 50_000u64;
        for i in 0..n {
            hll.add(format!("key-{}", i).as_bytes());
        }

        let estimate = hll.count() as f64;
        let tolerance = 3.0 * hll.estimated_error() * n as f64;
        assert!(
            (estimate - n as f64).abs() < tolerance,
            "estimate {} outside tolerance {} of {}",
            estimate,
            tolerance,
            n
        );
    }

    #[test]
    fn test_duplicates_do_not_inflate() {
        let mut hll = HyperLogLog::new(12);
        for _ in 0..10 {
            for i in 0..1000 {
                hll.add(format!("key-{}", i).as_bytes());
            }
        }

        let estimate = hll.count();
        assert!((950..=1050).contains(&estimate), "estimate {}", estimate);
    }

    #[test]
    fn test_estimated_error() {
        let hll = HyperLogLog::new(14);
        let m = (1u32 << 14) as f64;
        assert!((hll.estimated_error() - 1.04 / m.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_merge() {
        let mut a = HyperLogLog::new(12);
        let mut b = HyperLogLog::new(12);

        for i in 0..5000 {
            a.add(format!("a-{}", i).as_bytes());
        }
        for i in 0..5000 {
            b.add(format!("b-{}", i).as_bytes());
        }

        a.merge(&b).unwrap();
        let estimate = a.count() as f64;
        assert!((estimate - 10_000.0).abs() / 10_000.0 < 0.1);
    }

    #[test]
    fn test_merge_precision_mismatch() {
        let mut a = HyperLogLog::new(12);
        let b = HyperLogLog::new(14);
        assert!(matches!(
            a.merge(&b),
            Err(SketchError::PrecisionMismatch { .. })
        ));
    }

    #[test]
    fn test_clear_then_readd_is_deterministic() {
        let mut hll = HyperLogLog::new(12);
        for i in 0..2000 {
            hll.add(format!("key-{}", i).as_bytes());
        }
        let before = hll.count();

        hll.clear();
        assert_eq!(hll.count(), 0);

        for i in 0..2000 {
            hll.add(format!("key-{}", i).as_bytes());
        }
        assert_eq!(hll.count(), before);
    }

    #[test]
    fn test_stats() {
        let mut hll = HyperLogLog::new(10);
        hll.add(b"one");
        let stats = hll.stats();
        assert_eq!(stats.precision, 10);
        assert_eq!(stats.registers, 1024);
        assert_eq!(stats.empty_registers, 1023);
        assert!(stats.max_register > 0);
    }
}
