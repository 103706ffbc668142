//! Adaptive sampling subsystem
//!
//! Decides which records survive the stream and where they land:
//!
//! - [`Reservoir`] and its weighted / stratified / time-windowed variants
//! - [`WindowStats`]: running mean/variance over a sliding time window
//! - [`AnomalyGate`]: threshold predicate that boosts sampling of outliers
//! - [`AdaptiveSampler`]: the keep/drop decision and per-stratum routing

pub mod reservoir;
pub mod window;
pub mod anomaly;
pub mod adaptive;

pub use adaptive::{AdaptiveSampler, SamplerConfig, SamplerStats};
pub use anomaly::{AnomalyGate, AnomalyThreshold};
pub use reservoir::{
    AllocationStrategy, Reservoir, StratifiedReservoir, TimeWindowedReservoir, WeightedReservoir,
};
pub use window::WindowStats;
