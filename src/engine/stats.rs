//! Engine counters
//!
//! Rolling statistics maintained by the query engine: query counts, a
//! rolling average latency, and the total-samples counter. The error rate
//! is computed externally (by comparing against ground truth where one
//! exists) and stored back here for reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mutable counters behind the engine's lock
#[derive(Debug, Clone)]
pub(crate) struct EngineCounters {
    pub total_queries: u64,
    pub approx_queries: u64,
    pub total_samples: u64,
    pub avg_latency_ns: f64,
    pub error_rate: f64,
    pub last_update: DateTime<Utc>,
}

impl EngineCounters {
    pub fn new() -> Self {
        Self {
            total_queries: 0,
            approx_queries: 0,
            total_samples: 0,
            avg_latency_ns: 0.0,
            error_rate: 0.0,
            last_update: Utc::now(),
        }
    }

    /// Fold one observed latency into the rolling average
    ///
    /// `avg' = (avg * (N - 1) + latest) / N` where N is the post-increment
    /// query count.
    pub fn observe_latency(&mut self, latency_ns: u64, approximate: bool) {
        let n = self.total_queries.max(1) as f64;
        self.avg_latency_ns = (self.avg_latency_ns * (n - 1.0) + latency_ns as f64) / n;

        if approximate {
            self.approx_queries += 1;
        }
        self.last_update = Utc::now();
    }
}

/// Engine statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    /// Queries executed (including failed dispatches)
    pub total_queries: u64,
    /// Queries whose result was approximate
    pub approx_queries: u64,
    /// Records offered to the engine
    pub total_samples: u64,
    /// Rolling average dispatch latency in nanoseconds
    pub avg_latency_ns: f64,
    /// Externally computed error rate
    pub error_rate: f64,
    /// Observed admitted/processed sampling ratio
    pub effective_sampling_rate: f64,
    /// Time of the last counter update
    pub last_update: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average() {
        let mut counters = EngineCounters::new();

        counters.total_queries = 1;
        counters.observe_latency(100, false);
        assert!((counters.avg_latency_ns - 100.0).abs() < 1e-9);

        counters.total_queries = 2;
        counters.observe_latency(300, false);
        assert!((counters.avg_latency_ns - 200.0).abs() < 1e-9);

        counters.total_queries = 3;
        counters.observe_latency(200, true);
        assert!((counters.avg_latency_ns - 200.0).abs() < 1e-9);
        assert_eq!(counters.approx_queries, 1);
    }
}
