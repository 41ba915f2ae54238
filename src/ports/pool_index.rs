//! Pool index port - read view of published items and their taxonomy tags.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::ItemId;
use crate::domain::item::{Item, TaxonomyFilter};

/// Port answering "which items satisfy filter F" queries.
///
/// Filters AND across dimensions and OR within one dimension's tag set.
#[async_trait]
pub trait PoolIndex: Send + Sync {
    /// Published items matching the filter, ordered by item id.
    ///
    /// No match is an empty vector, never an error.
    async fn query(&self, filter: &TaxonomyFilter) -> Result<Vec<Item>, PoolIndexError>;

    /// Look up a single item regardless of status.
    async fn get(&self, item_id: &ItemId) -> Result<Option<Item>, PoolIndexError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolIndexError {
    #[error("pool index unavailable: {0}")]
    Unavailable(String),

    #[error("invalid pool data: {0}")]
    InvalidData(String),
}
