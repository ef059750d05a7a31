use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::CoreError;
use crate::providers::retry::RetryPolicy;

/// Engine configuration. Every field has a default, so a config file only
/// needs to mention what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root for ledgers (`users/<user>/<kind>/`), strategy checkpoints
    /// and the per-symbol price cache (`stock_data/`).
    pub data_dir: PathBuf,

    /// Directory with the bundled reference data
    /// (`valid_symbols.csv`, `csv_symbols.csv`, `stock_data/<SYM>.csv`).
    pub reference_dir: Option<PathBuf>,

    /// Last date the bundled reference series may answer for.
    pub reference_cutoff: NaiveDate,

    /// API keys by provider (e.g. "alphavantage").
    pub api_keys: HashMap<String, String>,

    /// Per-request timeout for quote sources.
    pub request_timeout_secs: u64,

    /// Extra attempts after a failed quote fetch.
    pub max_retries: u32,

    /// Base delay between quote fetch attempts; grows linearly per attempt.
    pub retry_backoff_ms: u64,

    /// Upper bound on any day-by-day backward scan.
    pub max_scan_days: i64,
}

/// Cutoff baked into the bundled reference series.
pub fn default_reference_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 10, 31).unwrap_or(NaiveDate::MIN)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("res"),
            reference_dir: None,
            reference_cutoff: default_reference_cutoff(),
            api_keys: HashMap::new(),
            request_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 250,
            max_scan_days: 366,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file. Missing fields fall back to defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_backoff_ms))
    }
}
