//! Approximate query engine
//!
//! The public entry point of the crate. Ingests measurement records through
//! the adaptive sampler, feeds the probabilistic sketches, and dispatches
//! query requests to the matching estimator:
//!
//! | Query type        | Estimator                                   |
//! |-------------------|---------------------------------------------|
//! | `count_distinct`  | HyperLogLog                                 |
//! | `frequency_count` | Count-Min point estimate                    |
//! | `top_k`           | Count-Min heavy hitters (bucket-level)      |
//! | `membership`      | Bloom filter                                |
//! | `sum` / `average` | Linear pass over reservoir samples          |
//! | `percentile`      | Sorted order statistic over samples         |
//!
//! Each sketch owns its own reader/writer lock; the engine's own counters
//! sit behind a coarse lock. Query results may reflect any linearization of
//! committed updates but never observe torn state.

pub mod parse;
pub mod stats;

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::time::Instant;

use crate::config::Config;
use crate::error::{QueryError, Result};
use crate::metrics;
use crate::sampling::{AdaptiveSampler, SamplerConfig, SamplerStats};
use crate::sketch::{BloomFilter, CountMinSketch, HyperLogLog};
use crate::types::{
    ApproximateCount, MeasurementRecord, MembershipOutcome, PercentileOutcome, QueryRequest,
    QueryResult, QueryType, QueryValue, TopKEntry, TopKOutcome,
};

pub use stats::EngineStats;

/// Cap on each stratum's sample list; the oldest prefix is dropped beyond it
const MAX_SAMPLES_PER_STRATUM: usize = 1000;

/// Samples below this count mark an average as approximate
const EXACTNESS_THRESHOLD: usize = 1000;

/// Engine construction parameters
#[derive(Debug, Clone)]
pub struct QueryEngineConfig {
    /// Cardinality sketch precision
    pub hll_precision: u8,
    /// Frequency sketch width
    pub cms_width: usize,
    /// Frequency sketch depth
    pub cms_depth: usize,
    /// Membership filter size in bits
    pub bloom_size: usize,
    /// Membership filter hash count
    pub bloom_hashes: usize,
    /// Sampler configuration
    pub sampling: SamplerConfig,
}

impl Default for QueryEngineConfig {
    fn default() -> Self {
        Self {
            hll_precision: 14,
            cms_width: 2048,
            cms_depth: 5,
            bloom_size: 1_000_000,
            bloom_hashes: 5,
            sampling: SamplerConfig::default(),
        }
    }
}

impl From<&Config> for QueryEngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            hll_precision: config.storage.hll_precision,
            cms_width: config.storage.cms_width,
            cms_depth: config.storage.cms_depth,
            bloom_size: config.storage.bloom_size,
            bloom_hashes: config.storage.bloom_hashes,
            sampling: SamplerConfig::from(&config.sampling),
        }
    }
}

// Payload of a dispatched query before the engine attaches timing metadata.
struct Outcome {
    result: QueryValue,
    error: Option<f64>,
    confidence: Option<f64>,
    sample_size: usize,
    is_approximate: bool,
}

/// The approximate query engine
pub struct QueryEngine {
    cardinality: RwLock<HyperLogLog>,
    frequency: RwLock<CountMinSketch>,
    membership: RwLock<BloomFilter>,
    sampler: AdaptiveSampler,
    samples: RwLock<HashMap<String, Vec<MeasurementRecord>>>,
    counters: Mutex<stats::EngineCounters>,
}

impl QueryEngine {
    /// Create an engine from explicit parameters
    pub fn new(config: QueryEngineConfig) -> Self {
        tracing::info!(
            hll_precision = config.hll_precision,
            cms_width = config.cms_width,
            cms_depth = config.cms_depth,
            bloom_size = config.bloom_size,
            "query engine created"
        );

        Self {
            cardinality: RwLock::new(HyperLogLog::new(config.hll_precision)),
            frequency: RwLock::new(CountMinSketch::new(config.cms_width, config.cms_depth)),
            membership: RwLock::new(BloomFilter::new(config.bloom_size, config.bloom_hashes)),
            sampler: AdaptiveSampler::new(config.sampling),
            samples: RwLock::new(HashMap::new()),
            counters: Mutex::new(stats::EngineCounters::new()),
        }
    }

    /// Create an engine from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(QueryEngineConfig::from(config))
    }

    /// Offer a record to the engine
    ///
    /// The sampler decides whether the record is kept; kept records update
    /// the sketches with the record's derived key and land in their
    /// stratum's bounded sample list. A record skipped by the sampler
    /// contributes to neither sketches nor reservoirs.
    pub fn ingest(&self, record: &MeasurementRecord) {
        let admitted = if let Some(sampled) = self.sampler.sample(record) {
            let key = sampled.key();
            let key_bytes = key.as_bytes();

            self.cardinality.write().add(key_bytes);
            self.frequency.write().update(key_bytes, 1);
            self.membership.write().add(key_bytes);

            let stratum = sampled.stratum();
            let mut samples = self.samples.write();
            let list = samples.entry(stratum).or_default();
            list.push(sampled);
            if list.len() > MAX_SAMPLES_PER_STRATUM {
                let excess = list.len() - MAX_SAMPLES_PER_STRATUM;
                list.drain(..excess);
            }

            true
        } else {
            false
        };

        self.counters.lock().total_samples += 1;
        metrics::record_ingest(admitted);
    }

    /// Execute a query request
    ///
    /// Routes on the typed `query_type`, attaches processing duration and
    /// wall-clock timestamp, and maintains the rolling latency average.
    ///
    /// # Errors
    ///
    /// Invalid-argument conditions (unknown parameters, out-of-range
    /// percentile, missing quoted item) surface as [`QueryError`]; the
    /// engine keeps serving afterwards.
    pub fn execute(&self, request: &QueryRequest) -> Result<QueryResult> {
        let start = Instant::now();

        self.counters.lock().total_queries += 1;

        let outcome = match self.dispatch(request) {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_query(
                    &request.query_type.to_string(),
                    start.elapsed().as_secs_f64(),
                    false,
                );
                return Err(e);
            }
        };

        let elapsed = start.elapsed();
        let processing_time = elapsed.as_nanos() as u64;

        self.counters
            .lock()
            .observe_latency(processing_time, outcome.is_approximate);
        metrics::record_query(
            &request.query_type.to_string(),
            elapsed.as_secs_f64(),
            true,
        );

        let id = if request.id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            request.id.clone()
        };

        tracing::debug!(
            id = %id,
            query_type = %request.query_type,
            sample_size = outcome.sample_size,
            "query executed"
        );

        Ok(QueryResult {
            id,
            query: request.query.clone(),
            result: outcome.result,
            error: outcome.error,
            confidence: outcome.confidence,
            sample_size: outcome.sample_size,
            processing_time,
            is_approximate: outcome.is_approximate,
            timestamp: chrono::Utc::now(),
        })
    }

    fn dispatch(&self, request: &QueryRequest) -> Result<Outcome> {
        match request.query_type {
            QueryType::CountDistinct => self.execute_count_distinct(),
            QueryType::Sum => Ok(self.execute_sum(request)),
            QueryType::Average => Ok(self.execute_average(request)),
            QueryType::Percentile => self.execute_percentile(request),
            QueryType::TopK => self.execute_top_k(request),
            QueryType::Membership => self.execute_membership(request),
            QueryType::FrequencyCount => self.execute_frequency_count(request),
        }
    }

    // ------------------------------------------------------------------
    // Sketch-backed estimators
    // ------------------------------------------------------------------

    fn execute_count_distinct(&self) -> Result<Outcome> {
        let cardinality = self.cardinality.read();
        let count = cardinality.count();
        let estimated_error = cardinality.estimated_error();
        drop(cardinality);

        Ok(Outcome {
            result: QueryValue::Count(ApproximateCount {
                count,
                estimated_error,
            }),
            error: Some(estimated_error),
            confidence: None,
            sample_size: self.total_sample_count(),
            is_approximate: true,
        })
    }

    fn execute_top_k(&self, request: &QueryRequest) -> Result<Outcome> {
        let k = parse::extract_k(&request.query);
        if k <= 0 {
            return Err(QueryError::InvalidK(k).into());
        }

        let frequency = self.frequency.read();
        let hitters = frequency.top_k(k as usize);
        let total = frequency.total();
        drop(frequency);

        let items = hitters
            .into_iter()
            .map(|hh| TopKEntry {
                key: format!("bucket_{}", hh.bucket),
                count: hh.count,
                frequency: hh.frequency,
            })
            .collect();

        Ok(Outcome {
            result: QueryValue::TopK(TopKOutcome {
                items,
                k: k as usize,
            }),
            error: None,
            confidence: None,
            sample_size: total as usize,
            is_approximate: true,
        })
    }

    fn execute_membership(&self, request: &QueryRequest) -> Result<Outcome> {
        let item = parse::extract_quoted(&request.query)
            .ok_or(QueryError::MissingItem("membership"))?;

        let membership = self.membership.read();
        let member = membership.contains(item.as_bytes());
        let false_positive_rate = membership.false_positive_rate();
        let inserted = membership.inserted();
        drop(membership);

        Ok(Outcome {
            result: QueryValue::Membership(MembershipOutcome {
                member,
                false_positive_rate,
            }),
            error: None,
            confidence: None,
            sample_size: inserted as usize,
            is_approximate: true,
        })
    }

    fn execute_frequency_count(&self, request: &QueryRequest) -> Result<Outcome> {
        let item = parse::extract_quoted(&request.query)
            .ok_or(QueryError::MissingItem("frequency_count"))?;

        let frequency = self.frequency.read();
        let count = frequency.estimate(item.as_bytes());
        let total = frequency.total();
        drop(frequency);

        Ok(Outcome {
            result: QueryValue::Number(count as f64),
            error: None,
            confidence: None,
            sample_size: total as usize,
            is_approximate: true,
        })
    }

    // ------------------------------------------------------------------
    // Sample-backed estimators
    // ------------------------------------------------------------------

    fn execute_sum(&self, request: &QueryRequest) -> Outcome {
        let samples = self.filtered_samples(request);

        if samples.is_empty() {
            return Outcome {
                result: QueryValue::Number(0.0),
                error: None,
                confidence: None,
                sample_size: 0,
                is_approximate: false,
            };
        }

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let raw_sum: f64 = values.iter().sum();

        // Horvitz-Thompson style correction: divide by the admission rate
        // for an unbiased estimate of the stream total.
        let sampling_rate = self.sampler.effective_rate();
        let estimated_sum = raw_sum / sampling_rate;

        let n = values.len() as f64;
        let standard_error = (sample_variance(&values) / n).sqrt() / sampling_rate;

        Outcome {
            result: QueryValue::Number(estimated_sum),
            error: Some(1.96 * standard_error),
            confidence: Some(0.95),
            sample_size: values.len(),
            is_approximate: true,
        }
    }

    fn execute_average(&self, request: &QueryRequest) -> Outcome {
        let samples = self.filtered_samples(request);

        if samples.is_empty() {
            return Outcome {
                result: QueryValue::Number(0.0),
                error: None,
                confidence: None,
                sample_size: 0,
                is_approximate: false,
            };
        }

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let n = values.len() as f64;
        let average = values.iter().sum::<f64>() / n;
        let standard_error = (sample_variance(&values) / n).sqrt();

        Outcome {
            result: QueryValue::Number(average),
            error: Some(standard_error),
            confidence: Some(0.95),
            sample_size: values.len(),
            // The sample mean converges; large samples are reported exact.
            is_approximate: values.len() < EXACTNESS_THRESHOLD,
        }
    }

    fn execute_percentile(&self, request: &QueryRequest) -> Result<Outcome> {
        let samples = self.filtered_samples(request);

        if samples.is_empty() {
            return Ok(Outcome {
                result: QueryValue::Null,
                error: None,
                confidence: None,
                sample_size: 0,
                is_approximate: false,
            });
        }

        let percentile = parse::extract_percentile(&request.query);
        if !(0.0..=100.0).contains(&percentile) {
            return Err(QueryError::InvalidPercentile(percentile).into());
        }

        let mut values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let index = (percentile / 100.0) * (values.len() - 1) as f64;
        let lower = index.floor() as usize;
        let upper = index.ceil() as usize;

        let value = if lower == upper {
            values[lower]
        } else {
            let weight = index - lower as f64;
            values[lower] * (1.0 - weight) + values[upper] * weight
        };

        Ok(Outcome {
            result: QueryValue::Percentile(PercentileOutcome {
                percentile,
                value,
                sample_size: values.len(),
            }),
            error: None,
            confidence: None,
            sample_size: values.len(),
            is_approximate: true,
        })
    }

    // ------------------------------------------------------------------
    // Sample access
    // ------------------------------------------------------------------

    fn filtered_samples(&self, request: &QueryRequest) -> Vec<MeasurementRecord> {
        self.samples
            .read()
            .values()
            .flatten()
            .filter(|record| Self::matches_filters(record, request))
            .cloned()
            .collect()
    }

    fn matches_filters(record: &MeasurementRecord, request: &QueryRequest) -> bool {
        if !request.time_range.contains(record.timestamp) {
            return false;
        }

        // Only the supported facets participate; unknown keys are ignored.
        for (key, value) in &request.filters {
            let matches = match key.as_str() {
                "cluster_id" => record.cluster_id == *value,
                "namespace" => record.namespace == *value,
                "metric_name" => record.metric_name == *value,
                "pod_name" => record.pod_name == *value,
                _ => true,
            };
            if !matches {
                return false;
            }
        }

        true
    }

    fn total_sample_count(&self) -> usize {
        self.samples.read().values().map(|list| list.len()).sum()
    }

    // ------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------

    /// Engine statistics snapshot
    ///
    /// Also refreshes the exported sampling-rate and strata gauges.
    pub fn stats(&self) -> EngineStats {
        let sampler_stats = self.sampler.stats();
        metrics::update_sampling_rate(sampler_stats.effective_sampling_rate);
        metrics::update_active_strata(sampler_stats.active_reservoirs);

        let counters = self.counters.lock();
        EngineStats {
            total_queries: counters.total_queries,
            approx_queries: counters.approx_queries,
            total_samples: counters.total_samples,
            avg_latency_ns: counters.avg_latency_ns,
            error_rate: counters.error_rate,
            effective_sampling_rate: sampler_stats.effective_sampling_rate,
            last_update: counters.last_update,
        }
    }

    /// Sampler counters snapshot
    pub fn sampler_stats(&self) -> SamplerStats {
        self.sampler.stats()
    }

    /// Store an externally computed error rate for reporting
    pub fn set_error_rate(&self, error_rate: f64) {
        self.counters.lock().error_rate = error_rate;
    }

    /// Direct access to the sampler, for construction-time tuning
    pub fn sampler(&self) -> &AdaptiveSampler {
        &self.sampler
    }
}

/// Sample variance with the n-1 denominator; zero below two values
fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let sum_squares: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();

    sum_squares / (n - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::SamplerConfig;

    // All records admitted: deterministic sample counts for assertions.
    fn keep_everything_engine() -> QueryEngine {
        QueryEngine::new(QueryEngineConfig {
            sampling: SamplerConfig {
                base_rate: 1.0,
                anomaly_rate: 1.0,
                ..SamplerConfig::default()
            },
            ..QueryEngineConfig::default()
        })
    }

    fn record(pod: &str, metric: &str, value: f64) -> MeasurementRecord {
        MeasurementRecord::new("prod", "default", pod, metric, value)
    }

    #[test]
    fn test_ingest_updates_sketches() {
        let engine = keep_everything_engine();

        for i in 0..100 {
            engine.ingest(&record(&format!("pod-{}", i), "cpu_usage", 0.5));
        }

        let request = QueryRequest::new("COUNT DISTINCT", QueryType::CountDistinct);
        let result = engine.execute(&request).unwrap();

        match result.result {
            QueryValue::Count(count) => {
                assert!((95..=105).contains(&count.count), "count {}", count.count);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        assert!(result.is_approximate);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_sum_with_filter() {
        let engine = keep_everything_engine();

        for _ in 0..10 {
            engine.ingest(&record("pod-1", "cpu_usage", 0.5));
            engine.ingest(&record("pod-1", "memory_usage", 0.25));
        }

        let request = QueryRequest::new("SUM(cpu_usage)", QueryType::Sum)
            .with_filter("metric_name", "cpu_usage");
        let result = engine.execute(&request).unwrap();

        assert_eq!(result.sample_size, 10);
        match result.result {
            // Effective rate is 1.0, so the estimate equals the raw sum.
            QueryValue::Number(sum) => assert!((sum - 5.0).abs() < 1e-9, "sum {}", sum),
            other => panic!("unexpected payload: {:?}", other),
        }
        assert_eq!(result.confidence, Some(0.95));
    }

    #[test]
    fn test_sum_empty_is_exact_zero() {
        let engine = keep_everything_engine();

        let request = QueryRequest::new("SUM(cpu_usage)", QueryType::Sum)
            .with_filter("metric_name", "cpu_usage");
        let result = engine.execute(&request).unwrap();

        assert_eq!(result.sample_size, 0);
        assert!(!result.is_approximate);
        assert_eq!(result.result, QueryValue::Number(0.0));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_average() {
        let engine = keep_everything_engine();

        for value in [1.0, 2.0, 3.0, 4.0] {
            engine.ingest(&record("pod-1", "cpu_usage", value));
        }

        let request = QueryRequest::new("AVG(cpu_usage)", QueryType::Average);
        let result = engine.execute(&request).unwrap();

        match result.result {
            QueryValue::Number(avg) => assert!((avg - 2.5).abs() < 1e-9, "avg {}", avg),
            other => panic!("unexpected payload: {:?}", other),
        }
        // Small sample: flagged approximate.
        assert!(result.is_approximate);
    }

    #[test]
    fn test_percentile_boundaries() {
        let engine = keep_everything_engine();

        for value in [5.0, 1.0, 3.0, 2.0, 4.0] {
            engine.ingest(&record("pod-1", "latency", value));
        }

        let p0 = engine
            .execute(&QueryRequest::new("PERCENTILE(0)", QueryType::Percentile))
            .unwrap();
        match p0.result {
            QueryValue::Percentile(p) => assert_eq!(p.value, 1.0),
            other => panic!("unexpected payload: {:?}", other),
        }

        let p100 = engine
            .execute(&QueryRequest::new("PERCENTILE(100)", QueryType::Percentile))
            .unwrap();
        match p100.result {
            QueryValue::Percentile(p) => assert_eq!(p.value, 5.0),
            other => panic!("unexpected payload: {:?}", other),
        }

        let p50 = engine
            .execute(&QueryRequest::new("PERCENTILE(50)", QueryType::Percentile))
            .unwrap();
        match p50.result {
            QueryValue::Percentile(p) => assert_eq!(p.value, 3.0),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_percentile_out_of_range_errors() {
        let engine = keep_everything_engine();
        engine.ingest(&record("pod-1", "latency", 1.0));

        let request = QueryRequest::new("PERCENTILE(150)", QueryType::Percentile);
        assert!(engine.execute(&request).is_err());

        // The engine keeps serving after an invalid argument.
        let request = QueryRequest::new("PERCENTILE(95)", QueryType::Percentile);
        assert!(engine.execute(&request).is_ok());
    }

    #[test]
    fn test_percentile_empty_yields_null() {
        let engine = keep_everything_engine();

        let request = QueryRequest::new("PERCENTILE(95)", QueryType::Percentile);
        let result = engine.execute(&request).unwrap();

        assert_eq!(result.result, QueryValue::Null);
        assert_eq!(result.sample_size, 0);
        assert!(!result.is_approximate);
    }

    #[test]
    fn test_membership() {
        let engine = keep_everything_engine();
        engine.ingest(&record("pod-1", "cpu_usage", 0.5));

        let request = QueryRequest::new(
            "CONTAINS('prod/default/pod-1/cpu_usage')",
            QueryType::Membership,
        );
        let result = engine.execute(&request).unwrap();

        match result.result {
            QueryValue::Membership(m) => assert!(m.member),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_membership_missing_item_errors() {
        let engine = keep_everything_engine();
        let request = QueryRequest::new("CONTAINS()", QueryType::Membership);
        assert!(engine.execute(&request).is_err());
    }

    #[test]
    fn test_frequency_count() {
        let engine = keep_everything_engine();

        for _ in 0..7 {
            engine.ingest(&record("pod-1", "cpu_usage", 0.5));
        }

        let request = QueryRequest::new(
            "FREQUENCY('prod/default/pod-1/cpu_usage')",
            QueryType::FrequencyCount,
        );
        let result = engine.execute(&request).unwrap();

        match result.result {
            // One-sided error: never below the true count.
            QueryValue::Number(count) => assert!(count >= 7.0, "count {}", count),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_top_k() {
        let engine = keep_everything_engine();

        for _ in 0..50 {
            engine.ingest(&record("hot-pod", "cpu_usage", 0.5));
        }
        engine.ingest(&record("cold-pod", "cpu_usage", 0.5));

        let request = QueryRequest::new("TOP_K(1)", QueryType::TopK);
        let result = engine.execute(&request).unwrap();

        match result.result {
            QueryValue::TopK(topk) => {
                assert_eq!(topk.k, 1);
                assert_eq!(topk.items.len(), 1);
                assert!(topk.items[0].count >= 50);
                assert!(topk.items[0].key.starts_with("bucket_"));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_top_k_invalid_k_errors() {
        let engine = keep_everything_engine();
        let request = QueryRequest::new("TOP_K(-1)", QueryType::TopK);
        assert!(engine.execute(&request).is_err());
    }

    #[test]
    fn test_sample_list_bounded() {
        let engine = keep_everything_engine();

        for i in 0..1500 {
            engine.ingest(&record("pod-1", "cpu_usage", i as f64));
        }

        assert_eq!(engine.total_sample_count(), MAX_SAMPLES_PER_STRATUM);

        // The retained suffix is the newest records.
        let request = QueryRequest::new("PERCENTILE(0)", QueryType::Percentile);
        let result = engine.execute(&request).unwrap();
        match result.result {
            QueryValue::Percentile(p) => assert_eq!(p.value, 500.0),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_stats_track_queries() {
        let engine = keep_everything_engine();
        engine.ingest(&record("pod-1", "cpu_usage", 0.5));

        engine
            .execute(&QueryRequest::new("COUNT DISTINCT", QueryType::CountDistinct))
            .unwrap();
        engine
            .execute(&QueryRequest::new("SUM(x)", QueryType::Sum))
            .unwrap();

        let stats = engine.stats();
        assert_eq!(stats.total_queries, 2);
        assert!(stats.approx_queries >= 1);
        assert_eq!(stats.total_samples, 1);
        assert!(stats.avg_latency_ns > 0.0);
        assert_eq!(stats.effective_sampling_rate, 1.0);
    }

    #[test]
    fn test_result_echoes_request() {
        let engine = keep_everything_engine();
        let mut request = QueryRequest::new("COUNT DISTINCT", QueryType::CountDistinct);
        request.id = "req-42".to_string();

        let result = engine.execute(&request).unwrap();
        assert_eq!(result.id, "req-42");
        assert_eq!(result.query, "COUNT DISTINCT");

        // Empty id is auto-generated.
        request.id.clear();
        let result = engine.execute(&request).unwrap();
        assert!(!result.id.is_empty());
    }

    #[test]
    fn test_time_range_filtering() {
        use chrono::{Duration, Utc};

        let engine = keep_everything_engine();
        let now = Utc::now();

        engine.ingest(&record("pod-1", "cpu_usage", 1.0).with_timestamp(now - Duration::hours(2)));
        engine.ingest(&record("pod-1", "cpu_usage", 3.0).with_timestamp(now));

        let range = crate::types::TimeRange::new(now - Duration::hours(1), now + Duration::hours(1));
        let request = QueryRequest::new("AVG(cpu_usage)", QueryType::Average).with_time_range(range);
        let result = engine.execute(&request).unwrap();

        assert_eq!(result.sample_size, 1);
        match result.result {
            QueryValue::Number(avg) => assert!((avg - 3.0).abs() < 1e-9),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_filter_keys_ignored() {
        let engine = keep_everything_engine();
        engine.ingest(&record("pod-1", "cpu_usage", 1.0));

        let request = QueryRequest::new("AVG(cpu_usage)", QueryType::Average)
            .with_filter("nonexistent_facet", "whatever");
        let result = engine.execute(&request).unwrap();

        assert_eq!(result.sample_size, 1);
    }
}
