//! Count-Min frequency sketch
//!
//! A width x depth table of counters indexed by pairwise-independent hash
//! functions. Estimates are one-sided: the reported count for a key is never
//! below its true count, and exceeds it by at most `e/width * total` with
//! probability `1 - (1/2)^depth`.

use serde::{Deserialize, Serialize};

use super::hash_bytes;
use crate::error::SketchError;

/// Frequency estimator with one-sided error
#[derive(Debug, Clone)]
pub struct CountMinSketch {
    width: usize,
    depth: usize,

    /// `depth` rows of `width` counters
    table: Vec<Vec<u64>>,

    /// Per-row affine hash constants, fixed at construction
    row_a: Vec<u64>,
    row_b: Vec<u64>,

    /// Sum of all deltas ever applied
    total: u64,
}

/// One heavy-hitter bucket from row 0
///
/// The sketch does not retain original keys, so heavy hitters are reported
/// by bucket index; see the module docs on the bucket-level contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeavyHitter {
    /// Row-0 bucket index
    pub bucket: usize,
    /// Counter value in that bucket
    pub count: u64,
    /// Fraction of the total stream
    pub frequency: f64,
}

impl CountMinSketch {
    /// Create a sketch with explicit dimensions
    pub fn new(width: usize, depth: usize) -> Self {
        let table = vec![vec![0u64; width]; depth];

        // Affine constants per row: h_i(x) = (a_i * H(x) + b_i) mod width.
        let row_a = (0..depth).map(|i| (i as u64) * 2 + 1).collect();
        let row_b = (0..depth).map(|i| (i as u64) * 3 + 7).collect();

        Self {
            width,
            depth,
            table,
            row_a,
            row_b,
            total: 0,
        }
    }

    /// Derive dimensions from target error bounds
    ///
    /// `width = ceil(e / epsilon)`, `depth = ceil(ln(1 / delta))`: estimates
    /// exceed truth by at most `epsilon * total` with probability
    /// `1 - delta`.
    pub fn from_error_rate(epsilon: f64, delta: f64) -> Self {
        let width = (std::f64::consts::E / epsilon).ceil() as usize;
        let depth = (1.0 / delta).ln().ceil() as usize;
        Self::new(width.max(1), depth.max(1))
    }

    /// Table width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Table depth (hash-function count)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Sum of all applied deltas
    pub fn total(&self) -> u64 {
        self.total
    }

    fn bucket(&self, hash: u64, row: usize) -> usize {
        let a = self.row_a[row];
        let b = self.row_b[row];
        (a.wrapping_mul(hash).wrapping_add(b) % self.width as u64) as usize
    }

    /// Add `delta` occurrences of a key
    pub fn update(&mut self, data: &[u8], delta: u64) {
        let hash = hash_bytes(data);

        for row in 0..self.depth {
            let bucket = self.bucket(hash, row);
            self.table[row][bucket] = self.table[row][bucket].saturating_add(delta);
        }

        self.total = self.total.saturating_add(delta);
    }

    /// Estimate the occurrence count of a key
    ///
    /// Never below the true post-sampling count.
    pub fn estimate(&self, data: &[u8]) -> u64 {
        let hash = hash_bytes(data);

        (0..self.depth)
            .map(|row| self.table[row][self.bucket(hash, row)])
            .min()
            .unwrap_or(0)
    }

    /// Buckets whose count reaches `threshold_fraction` of the total
    ///
    /// Walks row 0 only; every cell meeting the threshold qualifies, so a
    /// zero threshold emits all `width` buckets. Results are sorted by
    /// frequency descending.
    pub fn heavy_hitters(&self, threshold_fraction: f64) -> Vec<HeavyHitter> {
        let min_count = (threshold_fraction * self.total as f64) as u64;

        let mut results: Vec<HeavyHitter> = self.table[0]
            .iter()
            .enumerate()
            .filter(|(_, &count)| count >= min_count)
            .map(|(bucket, &count)| HeavyHitter {
                bucket,
                count,
                frequency: if self.total == 0 {
                    0.0
                } else {
                    count as f64 / self.total as f64
                },
            })
            .collect();

        results.sort_by(|a, b| {
            b.frequency
                .partial_cmp(&a.frequency)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        results
    }

    /// The `k` most frequent buckets
    pub fn top_k(&self, k: usize) -> Vec<HeavyHitter> {
        let mut hitters = self.heavy_hitters(0.0);
        hitters.truncate(k);
        hitters
    }

    /// Merge another sketch into this one
    ///
    /// # Errors
    ///
    /// Returns [`SketchError::DimensionMismatch`] when shapes differ.
    pub fn merge(&mut self, other: &CountMinSketch) -> Result<(), SketchError> {
        if self.width != other.width || self.depth != other.depth {
            return Err(SketchError::DimensionMismatch {
                self_width: self.width,
                self_depth: self.depth,
                other_width: other.width,
                other_depth: other.depth,
            });
        }

        for (mine, theirs) in self.table.iter_mut().zip(&other.table) {
            for (cell, &value) in mine.iter_mut().zip(theirs) {
                *cell = cell.saturating_add(value);
            }
        }

        self.total = self.total.saturating_add(other.total);
        Ok(())
    }

    /// Zero all cells and the total
    pub fn clear(&mut self) {
        for row in &mut self.table {
            row.fill(0);
        }
        self.total = 0;
    }

    /// Occupancy snapshot
    pub fn stats(&self) -> CountMinStats {
        let total_cells = self.width * self.depth;
        let mut non_zero = 0usize;
        let mut max_count = 0u64;

        for row in &self.table {
            for &cell in row {
                if cell > 0 {
                    non_zero += 1;
                }
                if cell > max_count {
                    max_count = cell;
                }
            }
        }

        CountMinStats {
            width: self.width,
            depth: self.depth,
            total_cells,
            non_zero_cells: non_zero,
            max_count,
            total_count: self.total,
            load_factor: non_zero as f64 / total_cells as f64,
        }
    }
}

/// Table occupancy snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountMinStats {
    /// Table width
    pub width: usize,
    /// Table depth
    pub depth: usize,
    /// width * depth
    pub total_cells: usize,
    /// Cells holding a non-zero count
    pub non_zero_cells: usize,
    /// Largest single counter
    pub max_count: u64,
    /// Sum of all applied deltas
    pub total_count: u64,
    /// non_zero / total cells
    pub load_factor: f64,
}
