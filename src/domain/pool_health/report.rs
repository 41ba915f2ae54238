//! Pool health report.
//!
//! Counts are an upper bound on true eligibility: they ignore candidate and
//! organization context and only require the item to be published.
//!
//! Each difficulty tag is its own bucket and is held to the same threshold as
//! the filter total. Difficulties the filter names explicitly are reported
//! even when no item carries them. Unrated items count toward the total only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::Timestamp;
use crate::domain::item::{Item, TaxonomyDimension, TaxonomyFilter};

/// Eligible counts per difficulty tag. Untagged items count under `"unrated"`.
pub type DifficultyBreakdown = BTreeMap<String, u32>;

const UNRATED: &str = "unrated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolHealthReport {
    pub bucket: String,
    pub filter: TaxonomyFilter,
    pub eligible_count: u32,
    pub threshold: u32,
    /// Set when the total or any difficulty bucket is below threshold.
    pub alert: bool,
    pub by_difficulty: DifficultyBreakdown,
    /// Difficulty buckets below threshold, in stable order.
    #[serde(default)]
    pub alerting_difficulties: Vec<String>,
    pub checked_at: Timestamp,
}

impl PoolHealthReport {
    /// Aggregates a pool query result. Non-selectable items are ignored.
    pub fn from_items(
        filter: &TaxonomyFilter,
        items: &[Item],
        threshold: u32,
        checked_at: Timestamp,
    ) -> Self {
        let mut by_difficulty = DifficultyBreakdown::new();
        let mut eligible_count = 0u32;

        for (dimension, allowed) in filter.constraints() {
            if *dimension == TaxonomyDimension::Difficulty {
                for tag in allowed {
                    by_difficulty.entry(tag.clone()).or_default();
                }
            }
        }

        for item in items.iter().filter(|i| i.status.is_selectable()) {
            eligible_count += 1;
            let mut rated = false;
            for tag in item.tags_in(&TaxonomyDimension::Difficulty) {
                *by_difficulty.entry(tag.to_string()).or_default() += 1;
                rated = true;
            }
            if !rated {
                *by_difficulty.entry(UNRATED.to_string()).or_default() += 1;
            }
        }

        let alerting_difficulties: Vec<String> = by_difficulty
            .iter()
            .filter(|(difficulty, count)| difficulty.as_str() != UNRATED && **count < threshold)
            .map(|(difficulty, _)| difficulty.clone())
            .collect();

        Self {
            bucket: filter.bucket_key(),
            filter: filter.clone(),
            eligible_count,
            threshold,
            alert: eligible_count < threshold || !alerting_difficulties.is_empty(),
            by_difficulty,
            alerting_difficulties,
            checked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ItemId;
    use crate::domain::item::ItemStatus;

    fn item(id: &str, status: ItemStatus, difficulty: Option<&str>) -> Item {
        let item = Item::new(ItemId::new(id).unwrap(), 1, status)
            .with_tag(TaxonomyDimension::Skill, "dsa");
        match difficulty {
            Some(d) => item.with_tag(TaxonomyDimension::Difficulty, d),
            None => item,
        }
    }

    #[test]
    fn counts_published_items_by_difficulty() {
        let filter = TaxonomyFilter::new().with_tag(TaxonomyDimension::Skill, "dsa");
        let items = vec![
            item("q1", ItemStatus::Published, Some("hard")),
            item("q2", ItemStatus::Published, Some("hard")),
            item("q3", ItemStatus::Published, None),
            item("q4", ItemStatus::Retired, Some("easy")),
        ];

        let report = PoolHealthReport::from_items(&filter, &items, 2, Timestamp::now());

        assert_eq!(report.eligible_count, 3);
        assert!(!report.alert);
        assert_eq!(report.by_difficulty.get("hard"), Some(&2));
        assert_eq!(report.by_difficulty.get("unrated"), Some(&1));
        assert_eq!(report.by_difficulty.get("easy"), None);
        assert_eq!(report.bucket, "skill=dsa");
        assert!(report.alerting_difficulties.is_empty());
    }

    #[test]
    fn thin_difficulty_bucket_alerts_despite_healthy_total() {
        let filter = TaxonomyFilter::new().with_tag(TaxonomyDimension::Skill, "dsa");
        let mut items: Vec<Item> = (0..30)
            .map(|n| item(&format!("e{}", n), ItemStatus::Published, Some("easy")))
            .collect();
        items.push(item("h1", ItemStatus::Published, Some("hard")));

        let report = PoolHealthReport::from_items(&filter, &items, 20, Timestamp::now());

        assert_eq!(report.eligible_count, 31);
        assert!(report.alert);
        assert_eq!(report.alerting_difficulties, vec!["hard".to_string()]);
    }

    #[test]
    fn filtered_difficulty_with_no_items_is_reported_empty() {
        let filter = TaxonomyFilter::new()
            .with_tag(TaxonomyDimension::Difficulty, "easy")
            .with_tag(TaxonomyDimension::Difficulty, "hard");
        let items = vec![
            item("q1", ItemStatus::Published, Some("easy")),
            item("q2", ItemStatus::Published, Some("easy")),
        ];

        let report = PoolHealthReport::from_items(&filter, &items, 1, Timestamp::now());

        assert_eq!(report.by_difficulty.get("hard"), Some(&0));
        assert_eq!(report.alerting_difficulties, vec!["hard".to_string()]);
        assert!(report.alert);
    }

    #[test]
    fn unrated_items_never_raise_a_bucket_alert() {
        let filter = TaxonomyFilter::new();
        let items = vec![
            item("q1", ItemStatus::Published, Some("easy")),
            item("q2", ItemStatus::Published, Some("easy")),
            item("q3", ItemStatus::Published, None),
        ];

        let report = PoolHealthReport::from_items(&filter, &items, 2, Timestamp::now());

        assert_eq!(report.by_difficulty.get("unrated"), Some(&1));
        assert!(!report.alert);
    }

    #[test]
    fn alerts_below_threshold() {
        let filter = TaxonomyFilter::new();
        let report = PoolHealthReport::from_items(&filter, &[], 5, Timestamp::now());
        assert!(report.alert);
        assert_eq!(report.eligible_count, 0);
    }
}
