//! Adaptive sampler
//!
//! The keep/drop decision for every incoming record. The admission rate
//! starts from a configured baseline and is adjusted per record: anomalies
//! are sampled aggressively, volatile strata more densely, saturated
//! resource metrics at double rate. Admitted records update their stratum's
//! window statistics and land in its reservoir.
//!
//! The rate decision, counters, reservoir map, and window-stats map are all
//! covered by one exclusive section; the section is short and contention is
//! bounded by the sampler fraction.

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::anomaly::AnomalyGate;
use super::reservoir::Reservoir;
use super::window::WindowStats;
use crate::config::SamplingSettings;
use crate::types::MeasurementRecord;

/// Minimum admission rate after all adjustments
const MIN_RATE: f64 = 0.001;

/// Sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Baseline admission probability
    pub base_rate: f64,

    /// Floor rate applied when the anomaly gate fires
    pub anomaly_rate: f64,

    /// Length of the per-stratum statistics window
    pub window_size: Duration,

    /// Capacity of each per-stratum reservoir
    pub reservoir_size: usize,

    /// Per-stratum rate multipliers
    pub stratum_weights: HashMap<String, f64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            base_rate: 0.05,
            anomaly_rate: 0.5,
            window_size: Duration::from_secs(3600),
            reservoir_size: 10_000,
            stratum_weights: HashMap::new(),
        }
    }
}

impl From<&SamplingSettings> for SamplerConfig {
    fn from(settings: &SamplingSettings) -> Self {
        Self {
            base_rate: settings.base_rate,
            anomaly_rate: settings.anomaly_rate,
            window_size: settings.window_size(),
            reservoir_size: settings.reservoir_size,
            stratum_weights: settings.stratum_weights.clone(),
        }
    }
}

// State behind the sampler's exclusive section.
#[derive(Debug)]
struct SamplerState {
    reservoirs: HashMap<String, Reservoir<MeasurementRecord>>,
    statistics: HashMap<String, WindowStats>,
    rng: SmallRng,
    total_processed: u64,
    total_sampled: u64,
}

/// Adaptive stratified sampler
pub struct AdaptiveSampler {
    config: SamplerConfig,
    gate: AnomalyGate,
    state: Mutex<SamplerState>,
}

impl AdaptiveSampler {
    /// Create a sampler with the given configuration
    pub fn new(config: SamplerConfig) -> Self {
        Self {
            config,
            gate: AnomalyGate::new(),
            state: Mutex::new(SamplerState {
                reservoirs: HashMap::new(),
                statistics: HashMap::new(),
                rng: SmallRng::from_entropy(),
                total_processed: 0,
                total_sampled: 0,
            }),
        }
    }

    /// Create with a fixed seed, for reproducible runs
    pub fn with_seed(config: SamplerConfig, seed: u64) -> Self {
        let sampler = Self::new(config);
        sampler.state.lock().rng = SmallRng::seed_from_u64(seed);
        sampler
    }

    /// Sampler configuration
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Offer a record to the sampler
    ///
    /// Returns the surviving stored copy when the record was admitted and
    /// kept by its stratum's reservoir, `None` otherwise.
    pub fn sample(&self, record: &MeasurementRecord) -> Option<MeasurementRecord> {
        let mut state = self.state.lock();

        state.total_processed += 1;

        let stratum = record.stratum();
        let rate = self.admission_rate(record, &stratum, &state);

        if state.rng.gen::<f64>() >= rate {
            return None;
        }
        state.total_sampled += 1;

        tracing::debug!(stratum = %stratum, rate, "record admitted");

        // Admitted: update window statistics, then route to the reservoir.
        let window_size = self.config.window_size;
        state
            .statistics
            .entry(stratum.clone())
            .or_insert_with(|| WindowStats::new(window_size))
            .add(record.value, record.timestamp);

        let reservoir_size = self.config.reservoir_size;
        state
            .reservoirs
            .entry(stratum)
            .or_insert_with(|| Reservoir::new(reservoir_size))
            .add(record.clone())
    }

    // Rate pipeline: base -> anomaly floor -> stratum weight -> variance
    // boost -> saturated-resource doubling -> clamp.
    fn admission_rate(&self, record: &MeasurementRecord, stratum: &str, state: &SamplerState) -> f64 {
        let mut rate = self.config.base_rate;

        if self.gate.is_anomalous(record) {
            rate = rate.max(self.config.anomaly_rate);
        }

        if let Some(weight) = self.config.stratum_weights.get(stratum) {
            rate *= weight;
        }

        if let Some(stats) = state.statistics.get(stratum) {
            rate *= 1.0 + stats.variance() / 100.0;
        }

        if (record.metric_name == "cpu_usage" || record.metric_name == "memory_usage")
            && record.value > 0.8
        {
            rate *= 2.0;
        }

        rate.clamp(MIN_RATE, 1.0)
    }

    /// Observed admitted/processed ratio; the base rate before any record
    pub fn effective_rate(&self) -> f64 {
        let state = self.state.lock();
        if state.total_processed == 0 {
            return self.config.base_rate;
        }
        state.total_sampled as f64 / state.total_processed as f64
    }

    /// Samples held for one stratum
    pub fn samples(&self, stratum: &str) -> Vec<MeasurementRecord> {
        self.state
            .lock()
            .reservoirs
            .get(stratum)
            .map(|r| r.samples())
            .unwrap_or_default()
    }

    /// Samples for every stratum
    pub fn all_samples(&self) -> HashMap<String, Vec<MeasurementRecord>> {
        self.state
            .lock()
            .reservoirs
            .iter()
            .map(|(stratum, reservoir)| (stratum.clone(), reservoir.samples()))
            .collect()
    }

    /// Variance of a stratum's window, zero when the stratum is unknown
    pub fn stratum_variance(&self, stratum: &str) -> f64 {
        self.state
            .lock()
            .statistics
            .get(stratum)
            .map(|s| s.variance())
            .unwrap_or(0.0)
    }

    /// Counters snapshot
    pub fn stats(&self) -> SamplerStats {
        let state = self.state.lock();
        let effective = if state.total_processed == 0 {
            self.config.base_rate
        } else {
            state.total_sampled as f64 / state.total_processed as f64
        };

        SamplerStats {
            total_processed: state.total_processed,
            total_sampled: state.total_sampled,
            effective_sampling_rate: effective,
            active_reservoirs: state.reservoirs.len(),
            base_rate: self.config.base_rate,
            anomaly_rate: self.config.anomaly_rate,
        }
    }
}

/// Sampler counters snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerStats {
    /// Records offered
    pub total_processed: u64,
    /// Records admitted
    pub total_sampled: u64,
    /// Admitted/processed ratio
    pub effective_sampling_rate: f64,
    /// Strata with a live reservoir
    pub active_reservoirs: usize,
    /// Configured baseline rate
    pub base_rate: f64,
    /// Configured anomaly floor
    pub anomaly_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(metric: &str, value: f64) -> MeasurementRecord {
        MeasurementRecord::new("prod", "default", "pod-1", metric, value)
    }

    fn config(base_rate: f64) -> SamplerConfig {
        SamplerConfig {
            base_rate,
            ..SamplerConfig::default()
        }
    }

    #[test]
    fn test_effective_rate_tracks_base_rate() {
        let sampler = AdaptiveSampler::with_seed(config(0.05), 42);

        // Before any record the configured base rate is reported.
        assert_eq!(sampler.effective_rate(), 0.05);

        for i in 0..50_000 {
            let r = record("disk_io", (i % 100) as f64 / 1000.0);
            sampler.sample(&r);
        }

        let rate = sampler.effective_rate();
        assert!((0.04..=0.06).contains(&rate), "effective rate {}", rate);
    }

    #[test]
    fn test_anomalies_sampled_aggressively() {
        let sampler = AdaptiveSampler::with_seed(config(0.01), 7);

        for _ in 0..2000 {
            sampler.sample(&record("cpu_usage", 0.99));
        }

        // Anomaly floor is 0.5 (doubled by the saturation rule, clamped).
        let rate = sampler.effective_rate();
        assert!(rate > 0.4, "effective rate {}", rate);
    }

    #[test]
    fn test_always_admit_at_rate_one() {
        let mut cfg = config(1.0);
        cfg.anomaly_rate = 1.0;
        let sampler = AdaptiveSampler::with_seed(cfg, 3);

        for i in 0..100 {
            let r = record("disk_io", i as f64);
            assert!(sampler.sample(&r).is_some());
        }

        assert_eq!(sampler.effective_rate(), 1.0);
        assert_eq!(sampler.samples("prod/default/disk_io").len(), 100);
    }

    #[test]
    fn test_stratum_weight_scales_rate() {
        let mut cfg = config(0.2);
        cfg.stratum_weights
            .insert("prod/default/disk_io".to_string(), 0.0);
        let sampler = AdaptiveSampler::with_seed(cfg, 11);

        for i in 0..5000 {
            sampler.sample(&record("disk_io", i as f64 / 5000.0));
        }

        // Weight zero clamps to the minimum rate: near-total suppression.
        let rate = sampler.effective_rate();
        assert!(rate < 0.01, "effective rate {}", rate);
    }

    #[test]
    fn test_reservoir_capacity_respected() {
        let mut cfg = config(1.0);
        cfg.reservoir_size = 50;
        let sampler = AdaptiveSampler::with_seed(cfg, 5);

        for i in 0..1000 {
            sampler.sample(&record("disk_io", i as f64));
        }

        assert_eq!(sampler.samples("prod/default/disk_io").len(), 50);
    }

    #[test]
    fn test_strata_kept_separate() {
        let cfg = config(1.0);
        let sampler = AdaptiveSampler::with_seed(cfg, 13);

        sampler.sample(&record("disk_io", 1.0));
        sampler.sample(&record("net_rx", 2.0));

        let all = sampler.all_samples();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key("prod/default/disk_io"));
        assert!(all.contains_key("prod/default/net_rx"));
    }

    #[test]
    fn test_stats_snapshot() {
        let sampler = AdaptiveSampler::with_seed(config(1.0), 17);
        sampler.sample(&record("disk_io", 1.0));

        let stats = sampler.stats();
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.total_sampled, 1);
        assert_eq!(stats.active_reservoirs, 1);
        assert_eq!(stats.base_rate, 1.0);
    }
}
