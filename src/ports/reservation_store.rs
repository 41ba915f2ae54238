//! Reservation store port - short-lived atomic claims on items.
//!
//! Claims prevent two in-flight selections from assigning the same item
//! inside one collision scope. State is ephemeral; losing it only widens
//! the collision window, the exposure ledger stays authoritative.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::domain::foundation::{HolderId, ItemId, OrganizationId, Timestamp};

/// Port for the atomic-claim store.
///
/// Implementations must provide compare-and-set semantics per
/// (scope, item) pair.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Try to claim every item for `holder` within `scope`.
    ///
    /// Items held by another live holder are reported as conflicted and
    /// left untouched. Items already held by `holder` count as claimed.
    async fn claim(
        &self,
        scope: &ScopeKey,
        item_ids: &[ItemId],
        holder: &HolderId,
        ttl: Duration,
    ) -> Result<ClaimOutcome, ReservationError>;

    /// Free all claims `holder` has in `scope`; returns how many were freed.
    async fn release(&self, scope: &ScopeKey, holder: &HolderId) -> Result<u32, ReservationError>;
}

/// Collision scope: organization + topic + time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub organization_id: OrganizationId,
    pub topic: String,
    pub bucket: u64,
}

impl ScopeKey {
    pub fn new(organization_id: OrganizationId, topic: impl Into<String>, bucket: u64) -> Self {
        Self {
            organization_id,
            topic: topic.into(),
            bucket,
        }
    }

    /// Scope for the bucket containing `at`.
    pub fn at(
        organization_id: OrganizationId,
        topic: impl Into<String>,
        at: &Timestamp,
        bucket_secs: u64,
    ) -> Self {
        let bucket = at.as_unix_secs() / bucket_secs.max(1);
        Self::new(organization_id, topic, bucket)
    }

    /// Key prefix used by shared stores.
    pub fn to_redis_key(&self) -> String {
        format!(
            "reservation:{}:{}:{}",
            self.organization_id, self.topic, self.bucket
        )
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_redis_key())
    }
}

/// Result of one batch claim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimOutcome {
    /// Items now held by the caller, in request order.
    pub claimed: Vec<ItemId>,
    /// Items held by someone else.
    pub conflicted: Vec<ItemId>,
}

impl ClaimOutcome {
    pub fn is_complete(&self) -> bool {
        self.conflicted.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReservationError {
    /// The store did not answer in time.
    #[error("reservation store timed out: {0}")]
    Timeout(String),

    #[error("reservation store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_key_buckets_by_time() {
        let org = OrganizationId::new("acme").unwrap();
        let at = Timestamp::from_unix_secs(1_000);
        let scope = ScopeKey::at(org, "dsa", &at, 300);
        assert_eq!(scope.bucket, 3);
        assert_eq!(scope.to_redis_key(), "reservation:acme:dsa:3");
    }

    #[test]
    fn zero_bucket_width_does_not_divide_by_zero() {
        let org = OrganizationId::new("acme").unwrap();
        let at = Timestamp::from_unix_secs(42);
        assert_eq!(ScopeKey::at(org, "sql", &at, 0).bucket, 42);
    }

    #[test]
    fn outcome_is_complete_without_conflicts() {
        let outcome = ClaimOutcome {
            claimed: vec![ItemId::new("q1").unwrap()],
            conflicted: vec![],
        };
        assert!(outcome.is_complete());
    }
}
