//! Reservoir sampling
//!
//! Fixed-size uniform samples over unbounded streams, in four flavors:
//! plain (Algorithm R), weighted (A-Res), stratified, and time-windowed.
//! Each reservoir owns its own random source so concurrent samplers never
//! contend on a shared PRNG.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::error::SamplingError;
use crate::types::MeasurementRecord;

// ============================================================================
// Plain Reservoir
// ============================================================================

/// Fixed-size uniform sample of a stream
///
/// After `n >= capacity` observations, every size-`capacity` subset of the
/// stream is equally likely to be the current sample.
#[derive(Debug, Clone)]
pub struct Reservoir<T> {
    capacity: usize,
    samples: Vec<T>,
    seen: u64,
    rng: SmallRng,
}

impl<T: Clone> Reservoir<T> {
    /// Create a reservoir holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: Vec::with_capacity(capacity),
            seen: 0,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Create with a fixed seed, for reproducible runs
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self {
            capacity,
            samples: Vec::with_capacity(capacity),
            seen: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently held
    pub fn size(&self) -> usize {
        self.samples.len()
    }

    /// Stream length observed since construction or clear
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Offer an item to the reservoir
    ///
    /// Returns the stored copy when the item survives the replacement draw,
    /// `None` when it was discarded.
    pub fn add(&mut self, item: T) -> Option<T> {
        self.seen += 1;

        if self.samples.len() < self.capacity {
            self.samples.push(item.clone());
            return Some(item);
        }

        // n-th item replaces a random slot with probability capacity/n.
        let j = self.rng.gen_range(0..self.seen) as usize;
        if j < self.capacity {
            self.samples[j] = item.clone();
            return Some(item);
        }

        None
    }

    /// Copy of the current sample set
    pub fn samples(&self) -> Vec<T> {
        self.samples.clone()
    }

    /// One uniformly chosen sample, if any are held
    pub fn random_sample(&mut self) -> Option<T> {
        if self.samples.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..self.samples.len());
        Some(self.samples[idx].clone())
    }

    /// Drop all samples and reset the stream counter
    pub fn clear(&mut self) {
        self.samples.clear();
        self.seen = 0;
    }
}

// ============================================================================
// Weighted Reservoir (A-Res)
// ============================================================================

/// One held item with its weight and replacement key
#[derive(Debug, Clone)]
pub struct WeightedSample<T> {
    /// The sampled item
    pub item: T,
    /// Weight it was offered with
    pub weight: f64,
    /// A-Res key: `u^(1/w)` for `u` uniform in (0, 1)
    pub key: f64,
}

/// Weighted reservoir using the A-Res scheme
///
/// Items with larger weights are proportionally more likely to be retained.
#[derive(Debug, Clone)]
pub struct WeightedReservoir<T> {
    capacity: usize,
    samples: Vec<WeightedSample<T>>,
    rng: SmallRng,
}

impl<T: Clone> WeightedReservoir<T> {
    /// Create a weighted reservoir holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: Vec::with_capacity(capacity),
            rng: SmallRng::from_entropy(),
        }
    }

    /// Create with a fixed seed, for reproducible runs
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self {
            capacity,
            samples: Vec::with_capacity(capacity),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Items currently held
    pub fn size(&self) -> usize {
        self.samples.len()
    }

    /// Offer an item with a weight
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidWeight`] when `weight <= 0`.
    pub fn add(&mut self, item: T, weight: f64) -> Result<(), SamplingError> {
        if weight <= 0.0 {
            return Err(SamplingError::InvalidWeight { weight });
        }

        let u: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let key = u.powf(1.0 / weight);

        let sample = WeightedSample { item, weight, key };

        if self.samples.len() < self.capacity {
            self.samples.push(sample);
            return Ok(());
        }

        // Replace the current minimum key when the new key beats it.
        let (min_idx, min_key) = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.key))
            .fold((0, f64::INFINITY), |acc, cur| {
                if cur.1 < acc.1 {
                    cur
                } else {
                    acc
                }
            });

        if key > min_key {
            self.samples[min_idx] = sample;
        }

        Ok(())
    }

    /// Copy of the current weighted sample set
    pub fn samples(&self) -> Vec<WeightedSample<T>> {
        self.samples.clone()
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

// ============================================================================
// Stratified Reservoir
// ============================================================================

/// How total capacity is divided among strata
///
/// All three strategies currently allocate equally; the selector is kept in
/// the interface for future differentiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationStrategy {
    /// Capacity proportional to stratum volume
    Proportional,
    /// Equal capacity per stratum
    #[default]
    Equal,
    /// Neyman-style allocation by stratum variance
    Optimal,
}

/// One plain reservoir per stratum, created lazily
#[derive(Debug)]
pub struct StratifiedReservoir<T> {
    strata: HashMap<String, Reservoir<T>>,
    total_capacity: usize,
    strategy: AllocationStrategy,
}

impl<T: Clone> StratifiedReservoir<T> {
    /// Create with a total capacity split across strata
    pub fn new(total_capacity: usize, strategy: AllocationStrategy) -> Self {
        Self {
            strata: HashMap::new(),
            total_capacity,
            strategy,
        }
    }

    /// Configured allocation strategy
    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    /// Number of strata observed so far
    pub fn stratum_count(&self) -> usize {
        self.strata.len()
    }

    fn stratum_capacity(&self) -> usize {
        // Proportional and optimal collapse to equal in this release.
        match self.strategy {
            AllocationStrategy::Proportional
            | AllocationStrategy::Equal
            | AllocationStrategy::Optimal => {
                self.total_capacity / (self.strata.len() + 1).max(1)
            }
        }
    }

    /// Offer an item to its stratum's reservoir
    pub fn add(&mut self, stratum: &str, item: T) -> Option<T> {
        // Capacity is fixed at first observation of the stratum.
        let capacity = self.stratum_capacity();
        self.strata
            .entry(stratum.to_string())
            .or_insert_with(|| Reservoir::new(capacity))
            .add(item)
    }

    /// Samples held for one stratum
    pub fn samples(&self, stratum: &str) -> Vec<T> {
        self.strata
            .get(stratum)
            .map(|r| r.samples())
            .unwrap_or_default()
    }

    /// All known stratum names
    pub fn strata(&self) -> Vec<String> {
        self.strata.keys().cloned().collect()
    }

    /// Samples for every stratum
    pub fn all_samples(&self) -> HashMap<String, Vec<T>> {
        self.strata
            .iter()
            .map(|(name, reservoir)| (name.clone(), reservoir.samples()))
            .collect()
    }

    /// Drop all strata
    pub fn clear(&mut self) {
        self.strata.clear();
    }
}

// ============================================================================
// Time-Windowed Reservoir
// ============================================================================

/// Reservoirs bucketed by time window
///
/// A record with timestamp `t` lands in bucket `floor(t / window)`. At most
/// `max_windows` buckets are retained; the oldest is evicted first.
#[derive(Debug)]
pub struct TimeWindowedReservoir {
    window_secs: i64,
    capacity: usize,
    max_windows: usize,
    windows: HashMap<i64, Reservoir<MeasurementRecord>>,
}

impl TimeWindowedReservoir {
    /// Create with a window length, per-window capacity, and bucket cap
    pub fn new(window: std::time::Duration, capacity: usize, max_windows: usize) -> Self {
        Self {
            window_secs: (window.as_secs() as i64).max(1),
            capacity,
            max_windows: max_windows.max(1),
            windows: HashMap::new(),
        }
    }

    fn window_key(&self, timestamp: chrono::DateTime<chrono::Utc>) -> i64 {
        timestamp.timestamp().div_euclid(self.window_secs)
    }

    /// Number of live buckets
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Offer a record to its time bucket
    ///
    /// A record so old that its bucket is evicted on arrival is dropped.
    pub fn add(&mut self, record: MeasurementRecord) -> Option<MeasurementRecord> {
        let key = self.window_key(record.timestamp);

        if !self.windows.contains_key(&key) {
            self.windows.insert(key, Reservoir::new(self.capacity));

            if self.windows.len() > self.max_windows {
                self.evict_oldest();
            }
        }

        self.windows.get_mut(&key).and_then(|r| r.add(record))
    }

    fn evict_oldest(&mut self) {
        while self.windows.len() > self.max_windows {
            if let Some(&oldest) = self.windows.keys().min() {
                self.windows.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Samples from the bucket covering `timestamp`
    pub fn window_samples(
        &self,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Vec<MeasurementRecord> {
        let key = self.window_key(timestamp);
        self.windows
            .get(&key)
            .map(|r| r.samples())
            .unwrap_or_default()
    }

    /// Samples from the `num_windows` most recent buckets, newest first
    pub fn recent_samples(&self, num_windows: usize) -> Vec<MeasurementRecord> {
        let mut keys: Vec<i64> = self.windows.keys().copied().collect();
        keys.sort_unstable_by(|a, b| b.cmp(a));

        keys.iter()
            .take(num_windows)
            .flat_map(|key| self.windows[key].samples())
            .collect()
    }

    /// Drop all buckets
    pub fn clear(&mut self) {
        self.windows.clear();
    }
}
