//! Configuration for the admission core.

use serde::{Deserialize, Serialize};

use crate::error::{AdmissionError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Quota ceilings for the composite gate
    #[serde(default)]
    pub limits: LimitConfig,

    /// Spam classifier thresholds
    #[serde(default)]
    pub spam: SpamConfig,

    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Garbage collection configuration
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Quota ceilings enforced by the composite admission gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Requests allowed per (user, IP) each minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u64,

    /// Requests allowed per (user, IP) each hour
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u64,

    /// Requests allowed per (user, IP) in a ten-second burst
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u64,

    /// Tokens a user may spend per UTC day
    #[serde(default = "default_daily_token_limit")]
    pub daily_token_limit: i64,

    /// Requests allowed per IP each hour, across all users
    #[serde(default = "default_ip_hourly_limit")]
    pub ip_hourly_limit: u64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            requests_per_hour: default_requests_per_hour(),
            burst_limit: default_burst_limit(),
            daily_token_limit: default_daily_token_limit(),
            ip_hourly_limit: default_ip_hourly_limit(),
        }
    }
}

fn default_requests_per_minute() -> u64 {
    30
}

fn default_requests_per_hour() -> u64 {
    200
}

fn default_burst_limit() -> u64 {
    5
}

fn default_daily_token_limit() -> i64 {
    100_000
}

fn default_ip_hourly_limit() -> u64 {
    1000
}

/// Thresholds for the heuristic spam classifier.
///
/// The pattern and keyword sets themselves are fixed; only the scoring
/// boundaries are configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpamConfig {
    /// Scores above this value classify the text as spam
    #[serde(default = "default_score_threshold")]
    pub score_threshold: u32,

    /// Texts shorter than this many characters are penalized
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Texts longer than this many characters are penalized
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Shannon entropy (bits per character) above which text is treated as gibberish
    #[serde(default = "default_entropy_threshold")]
    pub entropy_threshold: f64,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            min_length: default_min_length(),
            max_length: default_max_length(),
            entropy_threshold: default_entropy_threshold(),
        }
    }
}

fn default_score_threshold() -> u32 {
    40
}

fn default_min_length() -> usize {
    2
}

fn default_max_length() -> usize {
    2000
}

fn default_entropy_threshold() -> f64 {
    4.5
}

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for the file-per-key store
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "data/admission".to_string()
}

/// Garbage collection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between collection passes
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,

    /// Records untouched for longer than this many seconds are removed
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval(),
            retention_secs: default_retention(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    600
}

fn default_retention() -> u64 {
    3600
}

impl AdmissionConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| AdmissionError::Config(e.to_string()))
    }
}
