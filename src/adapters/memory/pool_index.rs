//! In-memory pool index with an inverted (dimension, tag) -> items index.
//!
//! Used by tests and by single-process deployments seeded from a JSON file.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::ItemId;
use crate::domain::item::{Item, TaxonomyFilter, TaxonomyTag};
use crate::ports::{PoolIndex, PoolIndexError};

#[derive(Debug, Default)]
struct IndexState {
    items: HashMap<ItemId, Item>,
    /// Only published items are indexed here.
    by_tag: HashMap<TaxonomyTag, BTreeSet<ItemId>>,
}

impl IndexState {
    fn remove(&mut self, item_id: &ItemId) {
        if let Some(previous) = self.items.remove(item_id) {
            for tag in &previous.tags {
                if let Some(ids) = self.by_tag.get_mut(tag) {
                    ids.remove(item_id);
                    if ids.is_empty() {
                        self.by_tag.remove(tag);
                    }
                }
            }
        }
    }

    fn insert(&mut self, item: Item) {
        self.remove(&item.id);
        if item.status.is_selectable() {
            for tag in &item.tags {
                self.by_tag
                    .entry(tag.clone())
                    .or_default()
                    .insert(item.id.clone());
            }
        }
        self.items.insert(item.id.clone(), item);
    }

    /// Published ids satisfying one dimension's OR set.
    fn ids_for_dimension(&self, tags: impl Iterator<Item = TaxonomyTag>) -> BTreeSet<ItemId> {
        tags.filter_map(|tag| self.by_tag.get(&tag))
            .flat_map(|ids| ids.iter().cloned())
            .collect()
    }
}

/// Pool index held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPoolIndex {
    state: Arc<RwLock<IndexState>>,
}

impl InMemoryPoolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one item (any status).
    pub async fn upsert(&self, item: Item) {
        self.state.write().await.insert(item);
    }

    /// Insert or replace many items.
    pub async fn load(&self, items: impl IntoIterator<Item = Item>) {
        let mut state = self.state.write().await;
        for item in items {
            state.insert(item);
        }
    }

    /// Total stored items regardless of status.
    pub async fn len(&self) -> usize {
        self.state.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Builds an index from a JSON array of items.
    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, PoolIndexError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            PoolIndexError::Unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let items: Vec<Item> = serde_json::from_str(&raw).map_err(|e| {
            PoolIndexError::InvalidData(format!("{}: {}", path.display(), e))
        })?;

        let index = Self::new();
        index.load(items).await;
        Ok(index)
    }
}

#[async_trait]
impl PoolIndex for InMemoryPoolIndex {
    async fn query(&self, filter: &TaxonomyFilter) -> Result<Vec<Item>, PoolIndexError> {
        let state = self.state.read().await;

        let ids: BTreeSet<ItemId> = if filter.is_empty() {
            state
                .items
                .values()
                .filter(|i| i.status.is_selectable())
                .map(|i| i.id.clone())
                .collect()
        } else {
            let mut narrowed: Option<BTreeSet<ItemId>> = None;
            for (dimension, allowed) in filter.constraints() {
                let matching = state.ids_for_dimension(
                    allowed
                        .iter()
                        .map(|tag| TaxonomyTag::new(dimension.clone(), tag.as_str())),
                );
                let next = match narrowed {
                    Some(current) => current.intersection(&matching).cloned().collect(),
                    None => matching,
                };
                if next.is_empty() {
                    return Ok(Vec::new());
                }
                narrowed = Some(next);
            }
            narrowed.unwrap_or_default()
        };

        Ok(ids
            .iter()
            .filter_map(|id| state.items.get(id))
            .filter(|item| item.status.is_selectable())
            .cloned()
            .collect())
    }

    async fn get(&self, item_id: &ItemId) -> Result<Option<Item>, PoolIndexError> {
        Ok(self.state.read().await.items.get(item_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::{ItemStatus, TaxonomyDimension};
    use std::io::Write;

    fn item(id: &str, status: ItemStatus, tags: &[(TaxonomyDimension, &str)]) -> Item {
        tags.iter().fold(
            Item::new(ItemId::new(id).unwrap(), 1, status),
            |item, (d, t)| item.with_tag(d.clone(), *t),
        )
    }

    async fn seeded() -> InMemoryPoolIndex {
        use TaxonomyDimension::*;
        let index = InMemoryPoolIndex::new();
        index
            .load(vec![
                item("q1", ItemStatus::Published, &[(Skill, "dsa"), (Difficulty, "hard")]),
                item("q2", ItemStatus::Published, &[(Skill, "dsa"), (Difficulty, "easy")]),
                item("q3", ItemStatus::Published, &[(Skill, "sql"), (Difficulty, "hard")]),
                item("q4", ItemStatus::Retired, &[(Skill, "dsa"), (Difficulty, "hard")]),
                item("q5", ItemStatus::Draft, &[(Skill, "dsa")]),
            ])
            .await;
        index
    }

    fn ids(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[tokio::test]
    async fn query_ands_across_dimensions() {
        let index = seeded().await;
        let filter = TaxonomyFilter::new()
            .with_tag(TaxonomyDimension::Skill, "dsa")
            .with_tag(TaxonomyDimension::Difficulty, "hard");

        let items = index.query(&filter).await.unwrap();
        assert_eq!(ids(&items), vec!["q1"]);
    }

    #[tokio::test]
    async fn query_ors_within_a_dimension() {
        let index = seeded().await;
        let filter = TaxonomyFilter::new()
            .with_tag(TaxonomyDimension::Skill, "dsa")
            .with_tag(TaxonomyDimension::Skill, "sql");

        let items = index.query(&filter).await.unwrap();
        assert_eq!(ids(&items), vec!["q1", "q2", "q3"]);
    }

    #[tokio::test]
    async fn no_match_is_empty_not_error() {
        let index = seeded().await;
        let filter = TaxonomyFilter::new().with_tag(TaxonomyDimension::Exam, "gate");
        assert!(index.query(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retiring_an_item_removes_it_from_queries() {
        let index = seeded().await;
        index
            .upsert(item("q1", ItemStatus::Retired, &[(TaxonomyDimension::Skill, "dsa")]))
            .await;

        let filter = TaxonomyFilter::new().with_tag(TaxonomyDimension::Skill, "dsa");
        assert_eq!(ids(&index.query(&filter).await.unwrap()), vec!["q2"]);
        assert_eq!(
            index.get(&ItemId::new("q1").unwrap()).await.unwrap().map(|i| i.status),
            Some(ItemStatus::Retired)
        );
    }

    #[tokio::test]
    async fn empty_filter_returns_all_published() {
        let index = seeded().await;
        let items = index.query(&TaxonomyFilter::new()).await.unwrap();
        assert_eq!(ids(&items), vec!["q1", "q2", "q3"]);
    }

    #[tokio::test]
    async fn loads_seed_file() {
        let items = vec![item(
            "seeded",
            ItemStatus::Published,
            &[(TaxonomyDimension::Skill, "dsa")],
        )];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&items).unwrap().as_bytes())
            .unwrap();

        let index = InMemoryPoolIndex::from_seed_file(file.path()).await.unwrap();
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn malformed_seed_file_is_invalid_data() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();

        let result = InMemoryPoolIndex::from_seed_file(file.path()).await;
        assert!(matches!(result, Err(PoolIndexError::InvalidData(_))));
    }
}
