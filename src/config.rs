//! Pipeline settings resolved from `TURNIP_*` environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::window::DateWindower;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub epoch: NaiveDate,
    pub store_path: PathBuf,
    pub query_timeout_ms: u64,
    pub num_weeks: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            epoch: DateWindower::default().epoch(),
            store_path: PathBuf::from("data/turnip.sqlite"),
            query_timeout_ms: 5_000,
            num_weeks: 1,
        }
    }
}

impl PipelineConfig {
    pub fn windower(&self) -> DateWindower {
        DateWindower::new(self.epoch)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

pub fn pipeline_config_from_env() -> PipelineConfig {
    let mut config = PipelineConfig::default();

    if let Ok(raw) = env::var("TURNIP_EPOCH") {
        if let Ok(epoch) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            config.epoch = epoch;
        }
    }

    if let Ok(path) = env::var("TURNIP_STORE_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            config.store_path = PathBuf::from(trimmed);
        }
    }

    if let Ok(raw) = env::var("TURNIP_QUERY_TIMEOUT_MS") {
        if let Some(timeout_ms) = raw.trim().parse::<u64>().ok().filter(|ms| *ms > 0) {
            config.query_timeout_ms = timeout_ms;
        }
    }

    if let Ok(raw) = env::var("TURNIP_NUM_WEEKS") {
        if let Some(num_weeks) = raw.trim().parse::<u32>().ok().filter(|n| *n > 0) {
            config.num_weeks = num_weeks;
        }
    }

    config
}
