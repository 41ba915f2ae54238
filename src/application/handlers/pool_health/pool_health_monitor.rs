//! PoolHealthMonitor - advisory eligible-count telemetry.
//!
//! Counts published items per watched taxonomy bucket, split by difficulty,
//! and raises a shortage signal when the bucket or any of its difficulties
//! drops below its threshold. It never blocks
//! selection; only the engine's pre-flight check does that.
//!
//! ## Configuration
//!
//! | Field | Default | Description |
//! |-------|---------|-------------|
//! | `default_threshold` | 20 | Minimum eligible items per bucket |
//! | `check_interval` | 300s | How often `run` scans watched buckets |

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::time;
use tracing::{info, warn};

use crate::domain::foundation::Timestamp;
use crate::domain::item::TaxonomyFilter;
use crate::domain::pool_health::PoolHealthReport;
use crate::ports::{PoolIndex, PoolIndexError};

/// Monitor tuning.
#[derive(Debug, Clone)]
pub struct PoolHealthConfig {
    pub default_threshold: u32,
    pub check_interval: Duration,
}

impl Default for PoolHealthConfig {
    fn default() -> Self {
        Self {
            default_threshold: 20,
            check_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
struct WatchedBucket {
    filter: TaxonomyFilter,
    threshold: u32,
}

/// Per-bucket pool size monitor.
pub struct PoolHealthMonitor {
    pool: Arc<dyn PoolIndex>,
    config: PoolHealthConfig,
    watched: RwLock<BTreeMap<String, WatchedBucket>>,
}

impl PoolHealthMonitor {
    pub fn new(pool: Arc<dyn PoolIndex>, config: PoolHealthConfig) -> Self {
        Self {
            pool,
            config,
            watched: RwLock::new(BTreeMap::new()),
        }
    }

    /// On-demand report for one bucket.
    pub async fn pool_health(
        &self,
        filter: &TaxonomyFilter,
        threshold: Option<u32>,
    ) -> Result<PoolHealthReport, PoolIndexError> {
        let items = self.pool.query(filter).await?;
        Ok(PoolHealthReport::from_items(
            filter,
            &items,
            threshold.unwrap_or(self.config.default_threshold),
            Timestamp::now(),
        ))
    }

    /// Adds a bucket to the periodic scan; re-watching replaces the threshold.
    pub async fn watch(&self, filter: TaxonomyFilter, threshold: Option<u32>) {
        let bucket = WatchedBucket {
            threshold: threshold.unwrap_or(self.config.default_threshold),
            filter,
        };
        self.watched
            .write()
            .await
            .insert(bucket.filter.bucket_key(), bucket);
    }

    pub async fn watched_buckets(&self) -> Vec<String> {
        self.watched.read().await.keys().cloned().collect()
    }

    /// Evaluates every watched bucket and returns the ones in alert.
    pub async fn scan(&self) -> Result<Vec<PoolHealthReport>, PoolIndexError> {
        let buckets: Vec<WatchedBucket> = self.watched.read().await.values().cloned().collect();

        let mut alerts = Vec::new();
        for bucket in buckets {
            let report = self.pool_health(&bucket.filter, Some(bucket.threshold)).await?;
            if report.alert {
                warn!(
                    bucket = %report.bucket,
                    eligible = report.eligible_count,
                    threshold = report.threshold,
                    short_difficulties = ?report.alerting_difficulties,
                    "pool shortage signal"
                );
                alerts.push(report);
            }
        }
        Ok(alerts)
    }

    /// Scans on an interval until the shutdown signal flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.check_interval);
        info!(
            interval_secs = self.config.check_interval.as_secs(),
            "pool health monitor started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("pool health monitor stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.scan().await {
                        warn!(error = %e, "pool health scan failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryPoolIndex;
    use crate::domain::foundation::ItemId;
    use crate::domain::item::{Item, ItemStatus, TaxonomyDimension};

    async fn pool_with(skill: &str, count: usize) -> InMemoryPoolIndex {
        let pool = InMemoryPoolIndex::new();
        pool.load((0..count).map(|n| {
            Item::new(ItemId::new(format!("{}-{}", skill, n)).unwrap(), 1, ItemStatus::Published)
                .with_tag(TaxonomyDimension::Skill, skill)
                .with_tag(TaxonomyDimension::Difficulty, if n % 2 == 0 { "easy" } else { "hard" })
        }))
        .await;
        pool
    }

    fn skill(tag: &str) -> TaxonomyFilter {
        TaxonomyFilter::new().with_tag(TaxonomyDimension::Skill, tag)
    }

    #[tokio::test]
    async fn on_demand_report_uses_default_threshold() {
        let monitor = PoolHealthMonitor::new(Arc::new(pool_with("dsa", 4).await), PoolHealthConfig::default());

        let report = monitor.pool_health(&skill("dsa"), None).await.unwrap();

        assert_eq!(report.eligible_count, 4);
        assert_eq!(report.threshold, 20);
        assert!(report.alert);
        assert_eq!(report.by_difficulty.get("easy"), Some(&2));
    }

    #[tokio::test]
    async fn scan_returns_only_alerting_buckets() {
        let pool = pool_with("dsa", 50).await;
        pool.load((0..2).map(|n| {
            Item::new(ItemId::new(format!("sql-{}", n)).unwrap(), 1, ItemStatus::Published)
                .with_tag(TaxonomyDimension::Skill, "sql")
        }))
        .await;
        let monitor = PoolHealthMonitor::new(Arc::new(pool), PoolHealthConfig::default());
        monitor.watch(skill("dsa"), None).await;
        monitor.watch(skill("sql"), Some(5)).await;

        let alerts = monitor.scan().await.unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].bucket, "skill=sql");
        assert_eq!(alerts[0].eligible_count, 2);
    }

    #[tokio::test]
    async fn scan_alerts_on_a_thin_difficulty() {
        let pool = InMemoryPoolIndex::new();
        pool.load(
            (0..30)
                .map(|n| {
                    Item::new(ItemId::new(format!("e{}", n)).unwrap(), 1, ItemStatus::Published)
                        .with_tag(TaxonomyDimension::Skill, "dsa")
                        .with_tag(TaxonomyDimension::Difficulty, "easy")
                })
                .chain(std::iter::once(
                    Item::new(ItemId::new("h0").unwrap(), 1, ItemStatus::Published)
                        .with_tag(TaxonomyDimension::Skill, "dsa")
                        .with_tag(TaxonomyDimension::Difficulty, "hard"),
                )),
        )
        .await;
        let monitor = PoolHealthMonitor::new(Arc::new(pool), PoolHealthConfig::default());
        monitor.watch(skill("dsa"), None).await;

        let alerts = monitor.scan().await.unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].eligible_count, 31);
        assert_eq!(alerts[0].alerting_difficulties, vec!["hard".to_string()]);
    }

    #[tokio::test]
    async fn rewatching_replaces_threshold() {
        let monitor = PoolHealthMonitor::new(Arc::new(pool_with("dsa", 3).await), PoolHealthConfig::default());
        monitor.watch(skill("dsa"), None).await;
        monitor.watch(skill("dsa"), Some(1)).await;

        assert_eq!(monitor.watched_buckets().await, vec!["skill=dsa".to_string()]);
        assert!(monitor.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let config = PoolHealthConfig {
            default_threshold: 1,
            check_interval: Duration::from_millis(10),
        };
        let monitor = Arc::new(PoolHealthMonitor::new(Arc::new(pool_with("dsa", 1).await), config));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn({
            let monitor = Arc::clone(&monitor);
            async move { monitor.run(rx).await }
        });
        time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        let result = time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok(), "monitor did not stop");
    }
}
