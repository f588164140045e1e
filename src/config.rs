use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment};
use serde::Deserialize;

use crate::retry::RetryPolicy;
use crate::scraper::DEFAULT_BASE_URL;

/// Defaults, overridable through `LAWPHIL_*` environment variables and
/// then by command-line flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub output_dir: PathBuf,
    pub progress_file: PathBuf,
    /// Pause between work units.
    pub delay_secs: f64,
    /// Pause before every HTTP request.
    pub request_delay_secs: f64,
    pub request_timeout_secs: u64,
    pub unit_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from("RESTRUCTURED_DB"),
            progress_file: PathBuf::from("scraping_progress.json"),
            delay_secs: 2.0,
            request_delay_secs: 1.0,
            request_timeout_secs: 30,
            unit_timeout_secs: 30 * 60,
            max_retries: 3,
            retry_backoff_ms: 2000,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("LAWPHIL").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn unit_delay(&self) -> Duration {
        secs(self.delay_secs)
    }

    pub fn request_delay(&self) -> Duration {
        secs(self.request_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff: Duration::from_millis(self.retry_backoff_ms),
            attempt_timeout: Duration::from_secs(self.unit_timeout_secs),
        }
    }
}

fn secs(s: f64) -> Duration {
    if s.is_nan() || s <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(s).unwrap_or(Duration::MAX)
    }
}
