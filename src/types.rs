//! Core data types shared across the query engine
//!
//! This module defines the measurement record ingested from the stream and
//! the query request/result model exposed to callers:
//!
//! # Key Types
//!
//! - **`MeasurementRecord`**: one observed metric sample (pod/container scoped)
//! - **`ClusterEvent`**: a cluster event, convertible into a measurement
//! - **`QueryType`**: the closed set of supported query types
//! - **`QueryRequest`** / **`QueryResult`**: the wire-level query contract
//! - **`TimeRange`**: optional [start, end) window for sample filtering
//!
//! # Example
//!
//! ```rust
//! use kubescope::types::MeasurementRecord;
//! use chrono::Utc;
//!
//! let record = MeasurementRecord::new("prod", "default", "api-7f9", "cpu_usage", 0.42)
//!     .with_container("api")
//!     .with_unit("percent");
//!
//! assert_eq!(record.key(), "prod/default/api-7f9/cpu_usage");
//! assert_eq!(record.stratum(), "prod/default/cpu_usage");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, QueryError};

// ============================================================================
// Measurement Record
// ============================================================================

/// A single observability measurement from the stream
///
/// Records are transient: they live only long enough for the sampler's
/// keep/drop decision and, if kept, a copy lands in a stratum reservoir.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Observation time (RFC3339 on the wire)
    pub timestamp: DateTime<Utc>,

    /// Originating cluster
    pub cluster_id: String,

    /// Kubernetes namespace
    pub namespace: String,

    /// Pod the measurement belongs to
    pub pod_name: String,

    /// Container within the pod (may be empty for pod-level metrics)
    pub container_name: String,

    /// Metric name, e.g. `cpu_usage`
    pub metric_name: String,

    /// Measured value
    pub value: f64,

    /// Unit of the value, e.g. `percent`, `bytes`
    pub unit: String,

    /// Free-form labels; absent on the wire decodes as empty
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl MeasurementRecord {
    /// Create a record stamped with the current time
    pub fn new(
        cluster_id: impl Into<String>,
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        metric_name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            cluster_id: cluster_id.into(),
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: String::new(),
            metric_name: metric_name.into(),
            value,
            unit: String::new(),
            labels: HashMap::new(),
        }
    }

    /// Set the container name
    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container_name = container.into();
        self
    }

    /// Set the unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Derived sketch key: `cluster/namespace/pod/metric`
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.cluster_id, self.namespace, self.pod_name, self.metric_name
        )
    }

    /// Stratum discriminator: `cluster/namespace/metric`
    ///
    /// One reservoir and one window-stats instance exist per stratum.
    pub fn stratum(&self) -> String {
        format!(
            "{}/{}/{}",
            self.cluster_id, self.namespace, self.metric_name
        )
    }

    /// Record-level anomaly rule
    ///
    /// Independent of configured thresholds: saturated CPU or memory and
    /// repeated restarts always count as anomalous.
    pub fn is_anomalous(&self) -> bool {
        match self.metric_name.as_str() {
            "cpu_usage" => self.value > 0.9,
            "memory_usage" => self.value > 0.85,
            "pod_restarts" => self.value > 3.0,
            _ => false,
        }
    }
}

/// Validate a record at the ingestion boundary
///
/// Intended for the stream shim, before the record reaches the engine; the
/// core ingest path does not re-validate. Negative values are allowed only
/// for the network counters.
pub fn validate_record(record: &MeasurementRecord) -> Result<(), Error> {
    if record.cluster_id.is_empty() {
        return Err(Error::General("cluster_id is required".to_string()));
    }
    if record.metric_name.is_empty() {
        return Err(Error::General("metric_name is required".to_string()));
    }
    if record.value < 0.0
        && record.metric_name != "network_in"
        && record.metric_name != "network_out"
    {
        return Err(Error::General(format!(
            "negative values not allowed for metric: {}",
            record.metric_name
        )));
    }
    Ok(())
}

// ============================================================================
// Cluster Events
// ============================================================================

/// A Kubernetes cluster event
///
/// Events enter the engine as measurements via [`ClusterEvent::into_record`];
/// the core never handles them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEvent {
    /// Event time
    pub timestamp: DateTime<Utc>,
    /// Originating cluster
    pub cluster_id: String,
    /// Namespace of the involved object
    pub namespace: String,
    /// Kind of the involved object (Pod, Deployment, ...)
    pub kind: String,
    /// Name of the involved object
    pub name: String,
    /// Machine-readable reason, e.g. `BackOff`
    pub reason: String,
    /// Event type (Normal / Warning)
    #[serde(rename = "type")]
    pub event_type: String,
    /// Human-readable message
    pub message: String,
    /// Occurrence count
    pub count: i32,
    /// Free-form labels
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl ClusterEvent {
    /// Convert the event into a measurement record
    ///
    /// The metric name is `k8s_event_<reason>`, the value is the occurrence
    /// count, and the event metadata is carried in labels.
    pub fn into_record(self) -> MeasurementRecord {
        let mut labels = self.labels;
        labels.insert("event_type".to_string(), self.event_type);
        labels.insert("event_reason".to_string(), self.reason.clone());
        labels.insert("kind".to_string(), self.kind);

        MeasurementRecord {
            timestamp: self.timestamp,
            cluster_id: self.cluster_id,
            namespace: self.namespace,
            pod_name: self.name,
            container_name: String::new(),
            metric_name: format!("k8s_event_{}", self.reason),
            value: self.count as f64,
            unit: "count".to_string(),
            labels,
        }
    }
}

// ============================================================================
// Query Types
// ============================================================================

/// The closed set of supported query types
///
/// The typed field is authoritative; the query text is incidental and only
/// mined for parameters (percentile, k, quoted item).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Number of distinct keys seen (cardinality sketch)
    CountDistinct,
    /// Sum over filter-matching samples, corrected for sampling rate
    Sum,
    /// Arithmetic mean over filter-matching samples
    Average,
    /// Linear-interpolated order statistic over filter-matching samples
    Percentile,
    /// Heavy-hitter buckets from the frequency sketch
    TopK,
    /// Probabilistic set membership
    Membership,
    /// Estimated occurrence count of one key
    FrequencyCount,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryType::CountDistinct => "count_distinct",
            QueryType::Sum => "sum",
            QueryType::Average => "average",
            QueryType::Percentile => "percentile",
            QueryType::TopK => "top_k",
            QueryType::Membership => "membership",
            QueryType::FrequencyCount => "frequency_count",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for QueryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count_distinct" => Ok(QueryType::CountDistinct),
            "sum" => Ok(QueryType::Sum),
            "average" => Ok(QueryType::Average),
            "percentile" => Ok(QueryType::Percentile),
            "top_k" => Ok(QueryType::TopK),
            "membership" => Ok(QueryType::Membership),
            "frequency_count" => Ok(QueryType::FrequencyCount),
            other => Err(QueryError::UnsupportedQueryType(other.to_string()).into()),
        }
    }
}

// ============================================================================
// Time Range
// ============================================================================

/// Optional time window for sample filtering
///
/// Start is inclusive, end is exclusive; either bound may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    /// Exclusive end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Create a fully-bounded range
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Check whether a timestamp falls inside the range
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if timestamp >= end {
                return false;
            }
        }
        true
    }

    /// True when neither bound is set
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

// ============================================================================
// Query Request / Result
// ============================================================================

/// A query submitted to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Request identifier; auto-generated when empty
    #[serde(default)]
    pub id: String,

    /// Opaque query text (parameters are mined from it)
    pub query: String,

    /// Which estimator answers the query
    pub query_type: QueryType,

    /// Optional time window restricting the sample set
    #[serde(default)]
    pub time_range: TimeRange,

    /// Facet filters; unknown keys are ignored
    #[serde(default)]
    pub filters: HashMap<String, String>,

    /// Requested error bound (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_bound: Option<f64>,

    /// Requested confidence (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl QueryRequest {
    /// Create a request with an auto-generated id
    pub fn new(query: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            query: query.into(),
            query_type,
            time_range: TimeRange::default(),
            filters: HashMap::new(),
            error_bound: None,
            confidence: None,
        }
    }

    /// Restrict the sample window
    pub fn with_time_range(mut self, range: TimeRange) -> Self {
        self.time_range = range;
        self
    }

    /// Add a facet filter
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// Typed query result payload
///
/// Serializes polymorphically: a bare number, a structured record, or null
/// for the zero-sample degenerate case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Scalar result (sum, average, frequency count)
    Number(f64),
    /// Cardinality estimate with its expected error
    Count(ApproximateCount),
    /// Heavy-hitter list
    TopK(TopKOutcome),
    /// Order statistic
    Percentile(PercentileOutcome),
    /// Membership verdict
    Membership(MembershipOutcome),
    /// No payload (empty sample set)
    Null,
}

/// Distinct-count estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproximateCount {
    /// Estimated number of distinct keys
    pub count: u64,
    /// Expected relative standard error of the estimate
    pub estimated_error: f64,
}

/// Heavy-hitter query outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKOutcome {
    /// Buckets ordered by frequency descending
    pub items: Vec<TopKEntry>,
    /// Requested k
    pub k: usize,
}

/// One heavy-hitter bucket
///
/// Keys are bucket labels, not original stream keys: the frequency sketch
/// does not retain keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKEntry {
    /// Bucket label, `bucket_<index>`
    pub key: String,
    /// Estimated occurrence count
    pub count: u64,
    /// Fraction of the total stream
    pub frequency: f64,
}

/// Percentile query outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileOutcome {
    /// Requested percentile in [0, 100]
    pub percentile: f64,
    /// Interpolated value
    pub value: f64,
    /// Number of samples the statistic was computed over
    pub sample_size: usize,
}

/// Membership query outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipOutcome {
    /// Whether the key is (probably) present
    pub member: bool,
    /// Current false-positive probability of the filter
    pub false_positive_rate: f64,
}

/// A completed query with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Echo of the request id
    pub id: String,

    /// Echo of the query text
    pub query: String,

    /// Typed payload; null for zero-sample degenerate results
    pub result: QueryValue,

    /// Expected error of the result, when quantifiable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<f64>,

    /// Confidence level attached to the error bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Number of samples backing the result
    pub sample_size: usize,

    /// Processing duration in nanoseconds
    pub processing_time: u64,

    /// Whether the result carries non-zero expected error
    pub is_approximate: bool,

    /// Wall-clock completion time
    pub timestamp: DateTime<Utc>,
}
