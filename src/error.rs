//! Error types for the query engine

use thiserror::Error;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum Error {
    /// Sketch error
    #[error("Sketch error: {0}")]
    Sketch(#[from] SketchError),

    /// Sampling error
    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    /// Query error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General error
    #[error("{0}")]
    General(String),
}

/// Sketch errors
///
/// Shape mismatches surface as typed errors so a caller can distinguish a
/// programming error (merging incompatible sketches) from stream data issues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SketchError {
    /// Precision mismatch on cardinality sketch merge
    #[error("Precision mismatch: cannot merge sketches with precision {self_precision} and {other_precision}")]
    PrecisionMismatch {
        /// Precision of the receiving sketch
        self_precision: u8,
        /// Precision of the other sketch
        other_precision: u8,
    },

    /// Dimension mismatch on frequency sketch merge
    #[error("Dimension mismatch: cannot merge {self_width}x{self_depth} with {other_width}x{other_depth}")]
    DimensionMismatch {
        /// Width of the receiving sketch
        self_width: usize,
        /// Depth of the receiving sketch
        self_depth: usize,
        /// Width of the other sketch
        other_width: usize,
        /// Depth of the other sketch
        other_depth: usize,
    },

    /// Parameter mismatch on membership sketch union
    #[error("Parameter mismatch: cannot union filters with different size or hash count")]
    ParameterMismatch,

    /// Invalid construction parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Sampling errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    /// Weighted reservoir received a non-positive weight
    #[error("Invalid weight {weight}: weights must be positive")]
    InvalidWeight {
        /// The offending weight
        weight: f64,
    },
}

/// Query errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Query type is not one of the supported set
    #[error("Unsupported query type: {0}")]
    UnsupportedQueryType(String),

    /// Percentile outside [0, 100]
    #[error("Invalid percentile value: {0}")]
    InvalidPercentile(f64),

    /// Top-k requested with k <= 0
    #[error("Invalid K value: {0}")]
    InvalidK(i64),

    /// Membership or frequency query without a quoted item
    #[error("No item specified for {0} query")]
    MissingItem(&'static str),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
