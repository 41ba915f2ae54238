//! Exposure ledger port - durable record of every item shown to a candidate.
//!
//! The ledger is the source of truth for every anti-repetition predicate.
//! Reads must reflect every write completed before the read began;
//! under-counting exposures leaks items across organizations.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::exposure::{ExposureRecord, ExposureResult, ItemExposureStats, NewExposure};
use crate::domain::foundation::{
    CandidateId, ErrorCode, InstanceId, ItemId, OrganizationId, Timestamp,
};

/// Port for the append-only exposure ledger.
///
/// Entries are keyed uniquely by (item, instance). The only permitted
/// mutation is the single viewed -> answered transition.
#[async_trait]
pub trait ExposureLedger: Send + Sync {
    /// Append a new entry.
    ///
    /// Returns `DuplicateWrite` if (item, instance) already exists.
    async fn record(&self, exposure: NewExposure) -> Result<ExposureRecord, LedgerError>;

    /// Apply the viewed -> answered mutation exactly once.
    async fn mark_answered(
        &self,
        item_id: &ItemId,
        instance_id: &InstanceId,
        result: ExposureResult,
    ) -> Result<ExposureRecord, LedgerError>;

    /// Exposures of a candidate, optionally narrowed to one item, oldest first.
    async fn history(
        &self,
        candidate_id: &CandidateId,
        item_id: Option<&ItemId>,
    ) -> Result<Vec<ExposureRecord>, LedgerError>;

    /// Distinct-candidate exposure counts per item within an organization.
    ///
    /// `window_start` of `None` counts all history. Items with no exposure
    /// may be absent from the map.
    async fn org_exposure_counts(
        &self,
        organization_id: &OrganizationId,
        item_ids: &[ItemId],
        window_start: Option<Timestamp>,
    ) -> Result<HashMap<ItemId, u32>, LedgerError>;

    /// Cross-candidate usage statistics per item.
    async fn item_exposure_stats(
        &self,
        item_ids: &[ItemId],
    ) -> Result<HashMap<ItemId, ItemExposureStats>, LedgerError>;
}

/// Errors from ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The (item, instance) entry already exists, or is already answered.
    #[error("duplicate exposure write for item {item_id} in instance {instance_id}")]
    DuplicateWrite {
        item_id: ItemId,
        instance_id: InstanceId,
    },

    #[error("no exposure for item {item_id} in instance {instance_id}")]
    NotFound {
        item_id: ItemId,
        instance_id: InstanceId,
    },

    /// Backing store is unreachable or failed.
    #[error("exposure ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    pub fn duplicate(item_id: &ItemId, instance_id: &InstanceId) -> Self {
        LedgerError::DuplicateWrite {
            item_id: item_id.clone(),
            instance_id: *instance_id,
        }
    }

    pub fn not_found(item_id: &ItemId, instance_id: &InstanceId) -> Self {
        LedgerError::NotFound {
            item_id: item_id.clone(),
            instance_id: *instance_id,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::DuplicateWrite { .. } => ErrorCode::DuplicateExposureWrite,
            LedgerError::NotFound { .. } => ErrorCode::ExposureNotFound,
            LedgerError::Unavailable(_) => ErrorCode::DatabaseError,
        }
    }
}
