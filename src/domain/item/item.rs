//! Item (question) as seen by the selection engine.
//!
//! Items are owned by the authoring subsystem; the engine only reads them
//! and pins their version at selection time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::foundation::ItemId;

use super::taxonomy::{TaxonomyDimension, TaxonomyTag};

/// Authoring lifecycle status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Draft,
    Review,
    Published,
    Retired,
}

impl ItemStatus {
    /// Only published items may ever be served.
    pub fn is_selectable(&self) -> bool {
        matches!(self, ItemStatus::Published)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Draft => "draft",
            ItemStatus::Review => "review",
            ItemStatus::Published => "published",
            ItemStatus::Retired => "retired",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An item with its taxonomy metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub version: u32,
    pub status: ItemStatus,
    pub tags: BTreeSet<TaxonomyTag>,
}

impl Item {
    pub fn new(id: ItemId, version: u32, status: ItemStatus) -> Self {
        Self {
            id,
            version,
            status,
            tags: BTreeSet::new(),
        }
    }

    /// Adds a tag (builder style).
    pub fn with_tag(mut self, dimension: TaxonomyDimension, tag: impl Into<String>) -> Self {
        self.tags.insert(TaxonomyTag::new(dimension, tag));
        self
    }

    /// Tags of one dimension, in stable order.
    pub fn tags_in<'a>(
        &'a self,
        dimension: &'a TaxonomyDimension,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |t| &t.dimension == dimension)
            .map(|t| t.tag.as_str())
    }
}
