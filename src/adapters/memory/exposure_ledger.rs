//! In-memory exposure ledger for testing and single-process deployments.
//!
//! A single `RwLock` guards every entry, so reads observe all writes that
//! completed before them (linearizable).

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::exposure::{ExposureRecord, ExposureResult, ItemExposureStats, NewExposure};
use crate::domain::foundation::{
    CandidateId, ExposureId, InstanceId, ItemId, OrganizationId, Timestamp,
};
use crate::ports::{ExposureLedger, LedgerError};

#[derive(Debug, Default)]
struct LedgerState {
    /// Entries in append order.
    records: Vec<ExposureRecord>,
    /// (item, instance) -> position in `records`.
    by_key: HashMap<(ItemId, InstanceId), usize>,
}

/// In-memory ledger backed by a vector and a uniqueness index.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExposureLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryExposureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every entry written for one instance.
    pub async fn records_for_instance(&self, instance_id: &InstanceId) -> Vec<ExposureRecord> {
        self.state
            .read()
            .await
            .records
            .iter()
            .filter(|r| &r.instance_id == instance_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExposureLedger for InMemoryExposureLedger {
    async fn record(&self, exposure: NewExposure) -> Result<ExposureRecord, LedgerError> {
        let mut state = self.state.write().await;
        let key = (exposure.item_id.clone(), exposure.instance_id);
        if state.by_key.contains_key(&key) {
            return Err(LedgerError::duplicate(&key.0, &key.1));
        }

        let record = ExposureRecord::from_new(ExposureId::new(), exposure);
        let position = state.records.len();
        state.records.push(record.clone());
        state.by_key.insert(key, position);
        Ok(record)
    }

    async fn mark_answered(
        &self,
        item_id: &ItemId,
        instance_id: &InstanceId,
        result: ExposureResult,
    ) -> Result<ExposureRecord, LedgerError> {
        let mut state = self.state.write().await;
        let position = *state
            .by_key
            .get(&(item_id.clone(), *instance_id))
            .ok_or_else(|| LedgerError::not_found(item_id, instance_id))?;

        let record = &mut state.records[position];
        record
            .answer(result)
            .map_err(|_| LedgerError::duplicate(item_id, instance_id))?;
        Ok(record.clone())
    }

    async fn history(
        &self,
        candidate_id: &CandidateId,
        item_id: Option<&ItemId>,
    ) -> Result<Vec<ExposureRecord>, LedgerError> {
        let state = self.state.read().await;
        let mut history: Vec<ExposureRecord> = state
            .records
            .iter()
            .filter(|r| &r.candidate_id == candidate_id)
            .filter(|r| item_id.map_or(true, |id| &r.item_id == id))
            .cloned()
            .collect();
        // Stable sort keeps append order for equal timestamps.
        history.sort_by_key(|r| r.used_at);
        Ok(history)
    }

    async fn org_exposure_counts(
        &self,
        organization_id: &OrganizationId,
        item_ids: &[ItemId],
        window_start: Option<Timestamp>,
    ) -> Result<HashMap<ItemId, u32>, LedgerError> {
        let wanted: HashSet<&ItemId> = item_ids.iter().collect();
        let state = self.state.read().await;

        let mut distinct: HashMap<ItemId, HashSet<&CandidateId>> = HashMap::new();
        for record in state.records.iter().filter(|r| {
            &r.organization_id == organization_id
                && wanted.contains(&r.item_id)
                && window_start.map_or(true, |start| r.used_at >= start)
        }) {
            distinct
                .entry(record.item_id.clone())
                .or_default()
                .insert(&record.candidate_id);
        }

        Ok(distinct
            .into_iter()
            .map(|(item, candidates)| (item, candidates.len() as u32))
            .collect())
    }

    async fn item_exposure_stats(
        &self,
        item_ids: &[ItemId],
    ) -> Result<HashMap<ItemId, ItemExposureStats>, LedgerError> {
        let wanted: HashSet<&ItemId> = item_ids.iter().collect();
        let state = self.state.read().await;

        let mut stats: HashMap<ItemId, ItemExposureStats> = HashMap::new();
        for record in state.records.iter().filter(|r| wanted.contains(&r.item_id)) {
            let entry = stats.entry(record.item_id.clone()).or_default();
            entry.total_exposures += 1;
            entry.last_exposed_at = match entry.last_exposed_at {
                Some(last) if last >= record.used_at => Some(last),
                _ => Some(record.used_at),
            };
        }
        Ok(stats)
    }
}
