use serde::{Deserialize, Serialize};
use std::fs;

/// Operating mode: `learn` observes and forwards telemetry without ever
/// blocking on the scoring path; `protect` enforces blocking decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Learn,
    #[default]
    Protect,
}

/// Immutable per-pipeline settings. Reconfiguration means constructing a
/// new engine; nothing here changes after start.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default)]
    pub scorer: ScorerConfig,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub static_rules: StaticRulesConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScorerConfig {
    #[serde(default = "default_scorer_url")]
    pub url: String,
    #[serde(default)]
    pub telemetry_url: Option<String>,
    #[serde(default = "default_scorer_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdmissionConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StaticRulesConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
    /// Whether static-rule violations block even in learn mode. They are
    /// unambiguous known-bad evidence, so the default is to block; set to
    /// false for parity with deployments that suppress them while learning.
    #[serde(default = "default_enabled")]
    pub block_in_learn: bool,
}

fn default_fail_open() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    1
}

fn default_scorer_url() -> String {
    "http://localhost:5000/predict".to_string()
}

fn default_scorer_timeout_ms() -> u64 {
    3000
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_enabled() -> bool {
    true
}

fn default_max_requests() -> u32 {
    120
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_body_bytes() -> usize {
    1_048_576 // 1 MiB
}

fn default_scan_limit() -> usize {
    20_000
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            url: default_scorer_url(),
            telemetry_url: None,
            timeout_ms: default_scorer_timeout_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for StaticRulesConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_body_bytes: default_max_body_bytes(),
            scan_limit: default_scan_limit(),
            block_in_learn: default_enabled(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scorer: ScorerConfig::default(),
            mode: Mode::default(),
            fail_open: default_fail_open(),
            sample_rate: default_sample_rate(),
            cache: CacheConfig::default(),
            admission: AdmissionConfig::default(),
            static_rules: StaticRulesConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}
