//! Sliding-window statistics
//!
//! Running mean and variance over a time-bounded window, maintained per
//! stratum by the adaptive sampler. Adds are O(1) amortized; eviction is
//! linear in the evicted prefix.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Running statistics over a sliding time window
///
/// Values and timestamps are held in parallel vectors; the running sum and
/// sum of squares are adjusted as old entries are evicted, so mean and
/// variance never require a full pass.
#[derive(Debug, Clone)]
pub struct WindowStats {
    values: Vec<f64>,
    timestamps: Vec<DateTime<Utc>>,
    window: Duration,
    sum: f64,
    sum_squares: f64,
}

impl WindowStats {
    /// Create statistics over a window of the given length
    pub fn new(window: Duration) -> Self {
        Self {
            values: Vec::new(),
            timestamps: Vec::new(),
            window,
            sum: 0.0,
            sum_squares: 0.0,
        }
    }

    /// Number of values currently inside the window
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no value is inside the window
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Record a value observed at `timestamp`
    ///
    /// Eviction is relative to the timestamp being added; an out-of-order
    /// old record may contribute briefly and be dropped by a later add.
    pub fn add(&mut self, value: f64, timestamp: DateTime<Utc>) {
        self.values.push(value);
        self.timestamps.push(timestamp);
        self.sum += value;
        self.sum_squares += value * value;

        self.evict_before(timestamp);
    }

    /// Mean of the windowed values; zero when empty
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum / self.values.len() as f64
    }

    /// Population variance of the windowed values; zero below two values
    pub fn variance(&self) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }

        let n = self.values.len() as f64;
        let mean = self.sum / n;
        (self.sum_squares / n - mean * mean).max(0.0)
    }

    // Drop the prefix whose timestamps are older than now - window,
    // subtracting its contribution from the running sums.
    fn evict_before(&mut self, now: DateTime<Utc>) {
        let cutoff = now
            - chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::zero());

        let keep_from = self
            .timestamps
            .iter()
            .position(|ts| *ts > cutoff)
            .unwrap_or(self.timestamps.len());

        if keep_from > 0 {
            for value in &self.values[..keep_from] {
                self.sum -= value;
                self.sum_squares -= value * value;
            }
            self.values.drain(..keep_from);
            self.timestamps.drain(..keep_from);
        }
    }
}
