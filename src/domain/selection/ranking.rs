//! Diversity weighting and seeded tie-break ordering.
//!
//! Ordering is a pure function of (seed, eligible items, items already
//! selected for the instance). The tie-break key of an item is the first
//! eight bytes of SHA-256(seed ‖ item id), so the order does not depend on
//! how the pool index happened to enumerate items.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::domain::foundation::ItemId;
use crate::domain::item::{Item, TaxonomyTag};

/// Seeded uniform draw for one item.
pub fn tie_break_key(seed: u64, item_id: &ItemId) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_be_bytes());
    hasher.update(item_id.as_str().as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// An eligible item with its ordering inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedItem {
    pub item: Item,
    /// 1 / (1 + tag overlap with already-selected items); 1.0 without diversity.
    pub weight: f64,
    pub tie_break: u64,
}

/// Orders eligible items for one instance.
///
/// Items finalized in earlier sections are fed back through `observe` so
/// later sections steer away from their tags.
#[derive(Debug, Clone)]
pub struct DiversityRanker {
    seed: u64,
    selected_tags: HashMap<TaxonomyTag, u32>,
}

impl DiversityRanker {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            selected_tags: HashMap::new(),
        }
    }

    /// Records a finalized item.
    pub fn observe(&mut self, item: &Item) {
        for tag in &item.tags {
            *self.selected_tags.entry(tag.clone()).or_insert(0) += 1;
        }
    }

    /// Returns items in selection order.
    pub fn rank(&self, items: Vec<Item>, enforce_diversity: bool) -> Vec<RankedItem> {
        let mut keyed: Vec<(u64, Item)> = items
            .into_iter()
            .map(|item| (tie_break_key(self.seed, &item.id), item))
            .collect();

        if !enforce_diversity {
            keyed.sort_by(|(ka, a), (kb, b)| ka.cmp(kb).then_with(|| a.id.cmp(&b.id)));
            return keyed
                .into_iter()
                .map(|(tie_break, item)| RankedItem {
                    item,
                    weight: 1.0,
                    tie_break,
                })
                .collect();
        }

        // Greedy: each ranked item counts as selected for those after it.
        let mut counts = self.selected_tags.clone();
        let mut ranked = Vec::with_capacity(keyed.len());
        while !keyed.is_empty() {
            let mut best = 0;
            let mut best_overlap = overlap(&counts, &keyed[0].1);
            for (idx, (key, item)) in keyed.iter().enumerate().skip(1) {
                let candidate_overlap = overlap(&counts, item);
                let (best_key, best_item) = (&keyed[best].0, &keyed[best].1);
                let better = candidate_overlap < best_overlap
                    || (candidate_overlap == best_overlap
                        && (key, &item.id) < (best_key, &best_item.id));
                if better {
                    best = idx;
                    best_overlap = candidate_overlap;
                }
            }

            let (tie_break, item) = keyed.swap_remove(best);
            for tag in &item.tags {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
            ranked.push(RankedItem {
                item,
                weight: 1.0 / (1.0 + f64::from(best_overlap)),
                tie_break,
            });
        }
        ranked
    }
}

fn overlap(counts: &HashMap<TaxonomyTag, u32>, item: &Item) -> u32 {
    item.tags
        .iter()
        .map(|tag| counts.get(tag).copied().unwrap_or(0))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::{ItemStatus, TaxonomyDimension};

    fn item(id: &str, tags: &[(TaxonomyDimension, &str)]) -> Item {
        tags.iter().fold(
            Item::new(ItemId::new(id).unwrap(), 1, ItemStatus::Published),
            |item, (d, t)| item.with_tag(d.clone(), *t),
        )
    }

    fn ids(ranked: &[RankedItem]) -> Vec<String> {
        ranked.iter().map(|r| r.item.id.to_string()).collect()
    }

    #[test]
    fn tie_break_key_is_reproducible() {
        let id = ItemId::new("q1").unwrap();
        assert_eq!(tie_break_key(42, &id), tie_break_key(42, &id));
        assert_ne!(tie_break_key(42, &id), tie_break_key(43, &id));
    }

    #[test]
    fn order_is_independent_of_input_order() {
        let ranker = DiversityRanker::new(9);
        let forward: Vec<Item> = (0..20).map(|i| item(&format!("q{i}"), &[])).collect();
        let mut backward = forward.clone();
        backward.reverse();

        assert_eq!(
            ids(&ranker.rank(forward, false)),
            ids(&ranker.rank(backward, false))
        );
    }

    #[test]
    fn different_seeds_shuffle_differently() {
        let items: Vec<Item> = (0..20).map(|i| item(&format!("q{i}"), &[])).collect();
        let a = ids(&DiversityRanker::new(1).rank(items.clone(), false));
        let b = ids(&DiversityRanker::new(2).rank(items, false));
        assert_ne!(a, b);
    }

    #[test]
    fn diversity_alternates_between_tags() {
        let items = vec![
            item("g1", &[(TaxonomyDimension::Skill, "graphs")]),
            item("g2", &[(TaxonomyDimension::Skill, "graphs")]),
            item("g3", &[(TaxonomyDimension::Skill, "graphs")]),
            item("d1", &[(TaxonomyDimension::Skill, "dp")]),
            item("d2", &[(TaxonomyDimension::Skill, "dp")]),
        ];
        let ranked = DiversityRanker::new(5).rank(items, true);

        let first_two: Vec<&str> = ranked[..2]
            .iter()
            .flat_map(|r| r.item.tags_in(&TaxonomyDimension::Skill))
            .collect();
        assert!(first_two.contains(&"graphs"));
        assert!(first_two.contains(&"dp"));
        assert_eq!(ranked[0].weight, 1.0);
    }

    #[test]
    fn observed_items_push_matching_tags_down() {
        let mut ranker = DiversityRanker::new(3);
        ranker.observe(&item("prev", &[(TaxonomyDimension::Skill, "graphs")]));

        let ranked = ranker.rank(
            vec![
                item("g1", &[(TaxonomyDimension::Skill, "graphs")]),
                item("d1", &[(TaxonomyDimension::Skill, "dp")]),
            ],
            true,
        );
        assert_eq!(ranked[0].item.id.as_str(), "d1");
        assert_eq!(ranked[1].weight, 0.5);
    }
}
