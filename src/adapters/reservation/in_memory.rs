//! In-memory reservation store for testing and single-process deployments.
//!
//! One mutex guards the whole claim map, which makes every per-item
//! compare-and-set atomic. Not shared across processes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::foundation::{HolderId, ItemId};
use crate::ports::{ClaimOutcome, ReservationError, ReservationStore, ScopeKey};

/// State for a single live claim.
#[derive(Debug, Clone)]
struct Claim {
    holder: HolderId,
    expires_at: Instant,
}

impl Claim {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Mutex-guarded map of (scope, item) -> claim.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReservationStore {
    claims: Arc<Mutex<HashMap<(ScopeKey, ItemId), Claim>>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired claims across every scope.
    pub async fn live_claims(&self) -> usize {
        let now = Instant::now();
        self.claims
            .lock()
            .await
            .values()
            .filter(|c| c.is_live(now))
            .count()
    }

    /// Current live holder of an item in a scope.
    pub async fn holder_of(&self, scope: &ScopeKey, item_id: &ItemId) -> Option<HolderId> {
        let now = Instant::now();
        self.claims
            .lock()
            .await
            .get(&(scope.clone(), item_id.clone()))
            .filter(|c| c.is_live(now))
            .map(|c| c.holder)
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn claim(
        &self,
        scope: &ScopeKey,
        item_ids: &[ItemId],
        holder: &HolderId,
        ttl: Duration,
    ) -> Result<ClaimOutcome, ReservationError> {
        let now = Instant::now();
        let mut claims = self.claims.lock().await;

        // Drop expired claims so the map does not grow without bound.
        claims.retain(|_, claim| claim.is_live(now));

        let mut outcome = ClaimOutcome::default();
        for item_id in item_ids {
            let key = (scope.clone(), item_id.clone());
            match claims.get(&key) {
                Some(existing) if &existing.holder != holder => {
                    outcome.conflicted.push(item_id.clone());
                }
                _ => {
                    claims.insert(
                        key,
                        Claim {
                            holder: *holder,
                            expires_at: now + ttl,
                        },
                    );
                    outcome.claimed.push(item_id.clone());
                }
            }
        }
        Ok(outcome)
    }

    async fn release(&self, scope: &ScopeKey, holder: &HolderId) -> Result<u32, ReservationError> {
        let now = Instant::now();
        let mut claims = self.claims.lock().await;
        let before = claims.len();
        let mut released = 0u32;

        claims.retain(|(claim_scope, _), claim| {
            if claim_scope == scope && &claim.holder == holder {
                if claim.is_live(now) {
                    released += 1;
                }
                return false;
            }
            true
        });

        tracing::trace!(scope = %scope, removed = before - claims.len(), "released claims");
        Ok(released)
    }
}
