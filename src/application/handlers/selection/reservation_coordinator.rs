//! ReservationCoordinator - bounded, retrying access to the claim store.
//!
//! Wraps a `ReservationStore` with a per-call timeout and exponential
//! backoff. Conflicts are ordinary results (the `conflicted` list); only
//! exhaustion of the retry budget is an error.
//!
//! Every scope a request touches is tracked by a [`ReservationLease`]. A
//! lease that is dropped without being settled releases its claims on a
//! spawned task, so an abandoned request never strands claims until TTL.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time;

use crate::domain::foundation::{HolderId, ItemId};
use crate::ports::{ClaimOutcome, ReservationError, ReservationStore, ScopeKey};

/// Coordinator tuning.
#[derive(Debug, Clone)]
pub struct ReservationCoordinatorConfig {
    /// Lifetime of a claim; bounded to the selection-to-commit latency.
    pub claim_ttl: Duration,
    /// Timeout for a single store call.
    pub call_timeout: Duration,
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled after each failure.
    pub initial_backoff: Duration,
}

impl Default for ReservationCoordinatorConfig {
    fn default() -> Self {
        Self {
            claim_ttl: Duration::from_secs(5),
            call_timeout: Duration::from_millis(250),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(25),
        }
    }
}

/// The store kept failing for every attempt.
#[derive(Debug, Clone, Error)]
#[error("reservation {operation} failed after {attempts} attempt(s): {source}")]
pub struct ReservationExhausted {
    pub operation: &'static str,
    pub attempts: u32,
    #[source]
    pub source: ReservationError,
}

/// Tracks the claims one selection request holds.
pub struct ReservationLease {
    holder: HolderId,
    scopes: Vec<ScopeKey>,
    store: Arc<dyn ReservationStore>,
    settled: bool,
}

impl ReservationLease {
    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    pub fn scopes(&self) -> &[ScopeKey] {
        &self.scopes
    }

    fn touch(&mut self, scope: &ScopeKey) {
        if !self.scopes.contains(scope) {
            self.scopes.push(scope.clone());
        }
    }

    /// Leaves the claims in place until their TTL; used after commit.
    pub fn keep_until_expiry(mut self) {
        self.settled = true;
    }
}

impl Drop for ReservationLease {
    fn drop(&mut self) {
        if self.settled || self.scopes.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(holder = %self.holder, "lease dropped outside a runtime; claims expire by TTL");
            return;
        };

        let store = Arc::clone(&self.store);
        let holder = self.holder;
        let scopes = std::mem::take(&mut self.scopes);
        runtime.spawn(async move {
            for scope in scopes {
                match store.release(&scope, &holder).await {
                    Ok(released) => {
                        tracing::debug!(%holder, %scope, released, "released claims of abandoned selection")
                    }
                    Err(e) => {
                        tracing::warn!(%holder, %scope, error = %e, "failed to release abandoned claims")
                    }
                }
            }
        });
    }
}

impl std::fmt::Debug for ReservationLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationLease")
            .field("holder", &self.holder)
            .field("scopes", &self.scopes)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}

/// Bounded-retry front end for a `ReservationStore`.
pub struct ReservationCoordinator {
    store: Arc<dyn ReservationStore>,
    config: ReservationCoordinatorConfig,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<dyn ReservationStore>, config: ReservationCoordinatorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ReservationCoordinatorConfig {
        &self.config
    }

    /// Opens a lease under a fresh holder id.
    pub fn open_lease(&self) -> ReservationLease {
        ReservationLease {
            holder: HolderId::new(),
            scopes: Vec::new(),
            store: Arc::clone(&self.store),
            settled: false,
        }
    }

    /// Claims a batch for the lease's holder.
    ///
    /// Retrying a claim is safe: items the holder already owns count as
    /// claimed again.
    pub async fn claim(
        &self,
        lease: &mut ReservationLease,
        scope: &ScopeKey,
        item_ids: &[ItemId],
    ) -> Result<ClaimOutcome, ReservationExhausted> {
        lease.touch(scope);
        let holder = lease.holder;
        let ttl = self.config.claim_ttl;
        let outcome = self
            .with_retry("claim", || self.store.claim(scope, item_ids, &holder, ttl))
            .await?;

        if !outcome.conflicted.is_empty() {
            tracing::debug!(
                %holder,
                %scope,
                claimed = outcome.claimed.len(),
                conflicted = outcome.conflicted.len(),
                "reservation conflict"
            );
        }
        Ok(outcome)
    }

    /// Releases every claim the lease holds and settles it.
    ///
    /// Release is best effort: failures are logged and the claims expire by
    /// TTL instead.
    pub async fn release_all(&self, mut lease: ReservationLease) -> u32 {
        let holder = lease.holder;
        let scopes = std::mem::take(&mut lease.scopes);
        lease.settled = true;

        let mut released = 0;
        for scope in &scopes {
            match self
                .with_retry("release", || self.store.release(scope, &holder))
                .await
            {
                Ok(count) => released += count,
                Err(e) => tracing::warn!(%holder, %scope, error = %e, "claims left to expire"),
            }
        }
        released
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, ReservationExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReservationError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match time::timeout(self.config.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ReservationError::Timeout(format!(
                    "{} exceeded {}ms",
                    operation,
                    self.config.call_timeout.as_millis()
                ))),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(operation, attempt, error = %e, "reservation store call failed, retrying");
                    time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => {
                    tracing::error!(operation, attempts = attempt, error = %e, "reservation store exhausted");
                    return Err(ReservationExhausted {
                        operation,
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}
