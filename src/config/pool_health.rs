//! Pool health monitor configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::PoolHealthConfig as MonitorConfig;
use crate::domain::item::TaxonomyFilter;

/// Pool health configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PoolHealthConfig {
    /// Minimum eligible items per bucket before a shortage signal
    #[serde(default = "default_threshold")]
    pub default_threshold: u32,

    /// Interval between background scans in seconds
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// JSON file of items loaded into the in-memory pool index
    pub seed_file: Option<PathBuf>,

    /// Buckets scanned by the background monitor, separated by `;`
    /// (e.g. `skill=dsa;skill=sql,difficulty=hard`). Defaults to the whole pool.
    pub watched_filters: Option<String>,
}

impl PoolHealthConfig {
    pub fn monitor(&self) -> MonitorConfig {
        MonitorConfig {
            default_threshold: self.default_threshold,
            check_interval: Duration::from_secs(self.check_interval_secs),
        }
    }

    /// Get watched filters as a list, `*` when none are configured
    pub fn watched_filters_list(&self) -> Result<Vec<TaxonomyFilter>, ValidationError> {
        let entries: Vec<&str> = self
            .watched_filters
            .as_deref()
            .map(|s| s.split(';').map(str::trim).filter(|e| !e.is_empty()).collect())
            .unwrap_or_default();
        if entries.is_empty() {
            return Ok(vec![TaxonomyFilter::new()]);
        }
        entries
            .into_iter()
            .map(|entry| {
                entry
                    .parse::<TaxonomyFilter>()
                    .map_err(|e| ValidationError::InvalidWatchedFilter(format!("'{}': {}", entry, e)))
            })
            .collect()
    }

    /// Validate pool health configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.check_interval_secs == 0 {
            return Err(ValidationError::InvalidCheckInterval);
        }
        self.watched_filters_list()?;
        Ok(())
    }
}

impl Default for PoolHealthConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            check_interval_secs: default_check_interval(),
            seed_file: None,
            watched_filters: None,
        }
    }
}

fn default_threshold() -> u32 {
    20
}

fn default_check_interval() -> u64 {
    300
}
