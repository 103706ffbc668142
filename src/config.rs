//! Configuration management for KubeScope
//!
//! This module provides configuration file support with TOML format,
//! environment variable overrides, and sensible defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Sampling configuration
    #[serde(default)]
    pub sampling: SamplingSettings,

    /// Sketch sizing configuration
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Sampling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SamplingSettings {
    /// Baseline admission probability
    #[serde(default = "default_base_rate")]
    pub base_rate: f64,

    /// Floor rate applied when a record is flagged anomalous
    #[serde(default = "default_anomaly_rate")]
    pub anomaly_rate: f64,

    /// Sliding statistics window in minutes
    #[serde(default = "default_window_size_min")]
    pub window_size_min: u64,

    /// Per-stratum reservoir capacity
    #[serde(default = "default_reservoir_size")]
    pub reservoir_size: usize,

    /// Per-stratum rate multipliers
    #[serde(default)]
    pub stratum_weights: HashMap<String, f64>,
}

/// Sketch sizing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Cardinality sketch precision (4..=16)
    #[serde(default = "default_hll_precision")]
    pub hll_precision: u8,

    /// Frequency sketch width
    #[serde(default = "default_cms_width")]
    pub cms_width: usize,

    /// Frequency sketch depth
    #[serde(default = "default_cms_depth")]
    pub cms_depth: usize,

    /// Membership filter size in bits
    #[serde(default = "default_bloom_size")]
    pub bloom_size: usize,

    /// Membership filter hash count
    #[serde(default = "default_bloom_hashes")]
    pub bloom_hashes: usize,
}

// Default value functions
fn default_base_rate() -> f64 { 0.05 }
fn default_anomaly_rate() -> f64 { 0.5 }
fn default_window_size_min() -> u64 { 60 }
fn default_reservoir_size() -> usize { 10_000 }
fn default_hll_precision() -> u8 { 14 }
fn default_cms_width() -> usize { 2048 }
fn default_cms_depth() -> usize { 5 }
fn default_bloom_size() -> usize { 1_000_000 }
fn default_bloom_hashes() -> usize { 5 }

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling: SamplingSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            base_rate: default_base_rate(),
            anomaly_rate: default_anomaly_rate(),
            window_size_min: default_window_size_min(),
            reservoir_size: default_reservoir_size(),
            stratum_weights: HashMap::new(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            hll_precision: default_hll_precision(),
            cms_width: default_cms_width(),
            cms_depth: default_cms_depth(),
            bloom_size: default_bloom_size(),
            bloom_hashes: default_bloom_hashes(),
        }
    }
}

impl SamplingSettings {
    /// Statistics window as a duration
    pub fn window_size(&self) -> Duration {
        Duration::from_secs(self.window_size_min * 60)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path, e))
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, String> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(rate) = std::env::var("KUBESCOPE_BASE_RATE") {
            if let Ok(r) = rate.parse() {
                self.sampling.base_rate = r;
            }
        }
        if let Ok(rate) = std::env::var("KUBESCOPE_ANOMALY_RATE") {
            if let Ok(r) = rate.parse() {
                self.sampling.anomaly_rate = r;
            }
        }
        if let Ok(size) = std::env::var("KUBESCOPE_RESERVOIR_SIZE") {
            if let Ok(s) = size.parse() {
                self.sampling.reservoir_size = s;
            }
        }
        if let Ok(precision) = std::env::var("KUBESCOPE_HLL_PRECISION") {
            if let Ok(p) = precision.parse() {
                self.storage.hll_precision = p;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.sampling.base_rate) {
            return Err("base_rate must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.sampling.anomaly_rate) {
            return Err("anomaly_rate must be within [0, 1]".to_string());
        }
        if self.sampling.reservoir_size == 0 {
            return Err("reservoir_size must be > 0".to_string());
        }
        if !(4..=16).contains(&self.storage.hll_precision) {
            return Err("hll_precision must be within [4, 16]".to_string());
        }
        if self.storage.cms_width == 0 || self.storage.cms_depth == 0 {
            return Err("frequency sketch dimensions must be > 0".to_string());
        }
        if self.storage.bloom_size == 0 || self.storage.bloom_hashes == 0 {
            return Err("membership filter parameters must be > 0".to_string());
        }
        for (stratum, weight) in &self.sampling.stratum_weights {
            if *weight < 0.0 {
                return Err(format!("stratum weight for '{}' must be >= 0", stratum));
            }
        }
        Ok(())
    }
}
