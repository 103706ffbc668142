//! Anomaly gate
//!
//! Threshold predicate used by the adaptive sampler to boost the sampling
//! rate of suspicious records. Ships with defaults for the common resource
//! metrics; thresholds can be replaced at runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::MeasurementRecord;

/// Bounds for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyThreshold {
    /// Metric the bounds apply to
    pub metric_name: String,
    /// Values above this are anomalous
    pub upper_bound: f64,
    /// Values below this are anomalous
    pub lower_bound: f64,
    /// Informational z-score the bounds correspond to
    pub z_score: f64,
}

/// Predicate flagging anomalous measurements
///
/// A record is anomalous if its own record-level rule fires
/// ([`MeasurementRecord::is_anomalous`]) or its value falls outside the
/// configured bounds for its metric.
#[derive(Debug, Clone)]
pub struct AnomalyGate {
    thresholds: HashMap<String, AnomalyThreshold>,
}

impl AnomalyGate {
    /// Create a gate with the default resource-metric thresholds
    pub fn new() -> Self {
        let mut gate = Self {
            thresholds: HashMap::new(),
        };
        gate.set_default_thresholds();
        gate
    }

    /// Test a record against the gate
    pub fn is_anomalous(&self, record: &MeasurementRecord) -> bool {
        if record.is_anomalous() {
            return true;
        }

        if let Some(threshold) = self.thresholds.get(&record.metric_name) {
            return record.value > threshold.upper_bound || record.value < threshold.lower_bound;
        }

        false
    }

    /// Install or replace the threshold for a metric
    pub fn set_threshold(&mut self, threshold: AnomalyThreshold) {
        self.thresholds
            .insert(threshold.metric_name.clone(), threshold);
    }

    /// Threshold configured for a metric, if any
    pub fn threshold(&self, metric_name: &str) -> Option<&AnomalyThreshold> {
        self.thresholds.get(metric_name)
    }

    fn set_default_thresholds(&mut self) {
        for (metric, upper, lower, z_score) in [
            ("cpu_usage", 0.9, 0.0, 3.0),
            ("memory_usage", 0.85, 0.0, 3.0),
            ("disk_usage", 0.9, 0.0, 2.5),
            ("network_latency", 1000.0, 0.0, 3.0),
        ] {
            self.set_threshold(AnomalyThreshold {
                metric_name: metric.to_string(),
                upper_bound: upper,
                lower_bound: lower,
                z_score,
            });
        }
    }
}

impl Default for AnomalyGate {
    fn default() -> Self {
        Self::new()
    }
}
