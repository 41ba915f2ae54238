//! SelectQuestionsHandler - Command handler assembling a test instance.
//!
//! Flow for one request:
//!
//! 1. Verify the snapshot's policy digest.
//! 2. Resolve every section against the pool index and evaluate each item
//!    with the policy evaluator.
//! 3. Pre-flight: a section whose eligible count is below
//!    `ceil(K × margin)` is short. Assessments fail here with every short
//!    section reported and nothing reserved.
//! 4. Rank, claim the top K, and backfill from the ranked tail until K are
//!    secured or the list is exhausted.
//! 5. Re-verify the digest, then write a `viewed` exposure for every item
//!    before returning the instance.
//!
//! Any failure after the first claim releases every claim before
//! returning. A successful commit leaves claims to expire by TTL.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::exposure::{ExposureRecord, NewExposure};
use crate::domain::foundation::{
    CandidateId, InstanceId, ItemId, OrganizationId, StateMachine, Timestamp,
};
use crate::domain::item::Item;
use crate::domain::policy::{Eligibility, ExposureSlice, IneligibilityReason, PolicyEvaluator};
use crate::domain::selection::{
    DiversityRanker, PinnedItem, ReasonHistogram, SectionAssignment, SectionRequirement,
    SectionShortage, SelectionError, SelectionState, ShortageReport, TemplateSnapshot,
    TestInstance,
};
use crate::ports::{ExposureLedger, LedgerError, PoolIndex, ScopeKey};

use super::reservation_coordinator::{
    ReservationCoordinator, ReservationExhausted, ReservationLease,
};

/// Command to select questions for one candidate.
#[derive(Debug, Clone)]
pub struct SelectQuestionsCommand {
    pub template: TemplateSnapshot,
    pub candidate_id: CandidateId,
    pub organization_id: OrganizationId,
    /// Fixed seed for audit replay; random when absent.
    pub seed: Option<u64>,
}

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct SelectionSettings {
    /// Pre-flight safety margin applied to each section's count.
    pub preflight_margin: f64,
    /// Width of the reservation time bucket.
    pub time_bucket_secs: u64,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            preflight_margin: 1.5,
            time_bucket_secs: 300,
        }
    }
}

impl SelectionSettings {
    /// Eligible items a section needs to pass pre-flight.
    pub fn required_with_margin(&self, count: u32) -> u32 {
        (f64::from(count) * self.preflight_margin).ceil() as u32
    }
}

/// Immutable inputs shared by every step of one request.
struct RequestContext<'a> {
    template: &'a TemplateSnapshot,
    candidate_id: &'a CandidateId,
    organization_id: &'a OrganizationId,
    now: Timestamp,
    seed: u64,
}

/// A section's eligible pool after policy evaluation.
struct ResolvedSection<'a> {
    requirement: &'a SectionRequirement,
    eligible: Vec<Item>,
    histogram: ReasonHistogram,
}

/// Handler for selection requests.
pub struct SelectQuestionsHandler {
    pool: Arc<dyn PoolIndex>,
    ledger: Arc<dyn ExposureLedger>,
    coordinator: Arc<ReservationCoordinator>,
    settings: SelectionSettings,
}

impl SelectQuestionsHandler {
    pub fn new(
        pool: Arc<dyn PoolIndex>,
        ledger: Arc<dyn ExposureLedger>,
        coordinator: Arc<ReservationCoordinator>,
        settings: SelectionSettings,
    ) -> Self {
        Self {
            pool,
            ledger,
            coordinator,
            settings,
        }
    }

    pub async fn handle(&self, cmd: SelectQuestionsCommand) -> Result<TestInstance, SelectionError> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.handle_with_cancel(cmd, cancel_rx).await
    }

    /// Runs a selection that the caller may abandon by sending `true`.
    ///
    /// Cancellation is observed before every claim round and before
    /// commit; claims are released before `Cancelled` is returned.
    pub async fn handle_with_cancel(
        &self,
        cmd: SelectQuestionsCommand,
        cancel: watch::Receiver<bool>,
    ) -> Result<TestInstance, SelectionError> {
        let SelectQuestionsCommand {
            template,
            candidate_id,
            organization_id,
            seed,
        } = cmd;

        let ctx = RequestContext {
            template: &template,
            candidate_id: &candidate_id,
            organization_id: &organization_id,
            now: Timestamp::now(),
            seed: seed.unwrap_or_else(rand::random),
        };
        let mut state = SelectionState::Resolving;

        info!(
            template = %template.template_id(),
            version = template.version(),
            candidate = %candidate_id,
            organization = %organization_id,
            stakes = %template.stakes(),
            seed = ctx.seed,
            "selecting questions"
        );

        ensure_policy_fresh(&template)?;
        let resolved = self.resolve(&ctx).await?;
        advance(&mut state, SelectionState::PreflightChecked)?;

        let short_sections = self.preflight(&resolved);
        if !short_sections.is_empty() {
            if !template.stakes().tolerates_shortage() {
                advance(&mut state, SelectionState::ShortageFailed)?;
                let report = ShortageReport {
                    template_id: template.template_id().clone(),
                    stakes: template.stakes(),
                    sections: short_sections,
                };
                warn!(
                    template = %template.template_id(),
                    sections = report.sections.len(),
                    summary = %report.summary(),
                    "pool shortage at pre-flight"
                );
                return Err(SelectionError::PoolShortage(report));
            }
            info!(
                template = %template.template_id(),
                sections = short_sections.len(),
                "practice selection continuing below pre-flight margin"
            );
        }
        advance(&mut state, SelectionState::Reserving)?;

        let mut lease = self.coordinator.open_lease();
        let outcome = self
            .reserve_and_commit(&ctx, resolved, &mut lease, &mut state, &cancel)
            .await;
        match outcome {
            Ok(instance) => {
                lease.keep_until_expiry();
                info!(
                    instance = %instance.id(),
                    template = %template.template_id(),
                    candidate = %candidate_id,
                    items = instance.item_ids().count(),
                    under_filled = instance.is_under_filled(),
                    "selection committed"
                );
                Ok(instance)
            }
            Err(err) => {
                let released = self.coordinator.release_all(lease).await;
                let terminal = match err {
                    SelectionError::PoolShortage(_) => SelectionState::ShortageFailed,
                    _ => SelectionState::Aborted,
                };
                if state.can_transition_to(&terminal) {
                    state = terminal;
                }
                warn!(
                    template = %template.template_id(),
                    candidate = %candidate_id,
                    state = ?state,
                    released,
                    error = %err,
                    "selection failed"
                );
                Err(err)
            }
        }
    }

    /// Queries the pool for every section and evaluates each item.
    async fn resolve<'a>(
        &self,
        ctx: &RequestContext<'a>,
    ) -> Result<Vec<ResolvedSection<'a>>, SelectionError> {
        let policy = ctx.template.policy();

        let mut pools = Vec::with_capacity(ctx.template.sections().len());
        for section in ctx.template.sections() {
            let items = self
                .pool
                .query(&section.filter)
                .await
                .map_err(|e| SelectionError::infrastructure(e.to_string()))?;
            pools.push((section, items));
        }

        let mut item_ids: Vec<ItemId> = pools
            .iter()
            .flat_map(|(_, items)| items.iter().map(|i| i.id.clone()))
            .collect();
        item_ids.sort();
        item_ids.dedup();

        let history = self
            .ledger
            .history(ctx.candidate_id, None)
            .await
            .map_err(ledger_failure)?;
        let mut history_by_item: HashMap<ItemId, Vec<ExposureRecord>> = HashMap::new();
        for record in history {
            history_by_item
                .entry(record.item_id.clone())
                .or_default()
                .push(record);
        }

        let org_counts = match policy.rotation_depth() {
            Some(_) => self
                .ledger
                .org_exposure_counts(
                    ctx.organization_id,
                    &item_ids,
                    policy.rotation_window_start(&ctx.now),
                )
                .await
                .map_err(ledger_failure)?,
            None => HashMap::new(),
        };

        let item_stats = if policy.global_cooldown_days.is_some()
            || policy.freeze_after_exposures.is_some()
        {
            self.ledger
                .item_exposure_stats(&item_ids)
                .await
                .map_err(ledger_failure)?
        } else {
            HashMap::new()
        };

        let evaluator = PolicyEvaluator::new(policy, ctx.now);
        let mut resolved = Vec::with_capacity(pools.len());
        for (requirement, items) in pools {
            let queried = items.len();
            let mut eligible = Vec::new();
            let mut histogram = ReasonHistogram::new();

            for item in items {
                let slice = ExposureSlice::from_candidate_history(
                    &item.id,
                    history_by_item
                        .get(&item.id)
                        .map(Vec::as_slice)
                        .unwrap_or_default(),
                )
                .with_item_stats(item_stats.get(&item.id).copied().unwrap_or_default())
                .with_org_distinct_candidates(org_counts.get(&item.id).copied().unwrap_or(0));

                match evaluator.evaluate(item.status, &slice) {
                    Eligibility::Eligible => eligible.push(item),
                    Eligibility::EligibleByOverride => {
                        info!(
                            item = %item.id,
                            candidate = %ctx.candidate_id,
                            exposures = slice.candidate_exposures,
                            "item admitted inside cooldown by policy override"
                        );
                        eligible.push(item);
                    }
                    Eligibility::Ineligible(reason) => {
                        *histogram.entry(reason).or_default() += 1;
                    }
                }
            }

            debug!(
                section = %requirement.id,
                queried,
                eligible = eligible.len(),
                required = requirement.count,
                "section resolved"
            );
            resolved.push(ResolvedSection {
                requirement,
                eligible,
                histogram,
            });
        }
        Ok(resolved)
    }

    /// Sections whose eligible count is below the pre-flight margin.
    fn preflight(&self, resolved: &[ResolvedSection<'_>]) -> Vec<SectionShortage> {
        resolved
            .iter()
            .filter_map(|section| {
                let required = section.requirement.count;
                let preflight_required = self.settings.required_with_margin(required);
                let available = section.eligible.len() as u32;
                (available < preflight_required).then(|| SectionShortage {
                    section: section.requirement.id.clone(),
                    available,
                    required,
                    preflight_required,
                    reason_histogram: section.histogram.clone(),
                })
            })
            .collect()
    }

    async fn reserve_and_commit(
        &self,
        ctx: &RequestContext<'_>,
        resolved: Vec<ResolvedSection<'_>>,
        lease: &mut ReservationLease,
        state: &mut SelectionState,
        cancel: &watch::Receiver<bool>,
    ) -> Result<TestInstance, SelectionError> {
        let enforce_diversity = ctx.template.policy().enforce_taxonomy_diversity;
        let mut ranker = DiversityRanker::new(ctx.seed);
        let mut assigned: HashSet<ItemId> = HashSet::new();
        let mut assignments = Vec::with_capacity(resolved.len());

        for section in resolved {
            if *state == SelectionState::Backfilling {
                advance(state, SelectionState::Reserving)?;
            }

            let ResolvedSection {
                requirement,
                eligible,
                mut histogram,
            } = section;
            let required = requirement.count;

            let (fresh, duplicates): (Vec<Item>, Vec<Item>) = eligible
                .into_iter()
                .partition(|item| !assigned.contains(&item.id));
            if !duplicates.is_empty() {
                *histogram
                    .entry(IneligibilityReason::DuplicateInInstance)
                    .or_default() += duplicates.len() as u32;
            }

            let scope = ScopeKey::at(
                ctx.organization_id.clone(),
                requirement.scope_topic(),
                &ctx.now,
                self.settings.time_bucket_secs,
            );
            let mut ranked = ranker
                .rank(fresh, enforce_diversity)
                .into_iter()
                .map(|ranked| ranked.item);
            let mut secured: Vec<Item> = Vec::with_capacity(required as usize);

            while secured.len() < required as usize {
                let batch: Vec<Item> = ranked
                    .by_ref()
                    .take(required as usize - secured.len())
                    .collect();
                if batch.is_empty() {
                    break;
                }
                ensure_not_cancelled(cancel)?;

                let batch_ids: Vec<ItemId> = batch.iter().map(|i| i.id.clone()).collect();
                let outcome = self
                    .coordinator
                    .claim(lease, &scope, &batch_ids)
                    .await
                    .map_err(coordinator_failure)?;

                let claimed: HashSet<&ItemId> = outcome.claimed.iter().collect();
                secured.extend(batch.into_iter().filter(|item| claimed.contains(&item.id)));

                if !outcome.conflicted.is_empty() {
                    *histogram
                        .entry(IneligibilityReason::ReservedElsewhere)
                        .or_default() += outcome.conflicted.len() as u32;
                    if *state == SelectionState::Reserving {
                        advance(state, SelectionState::PartiallyReserved)?;
                    }
                    advance(state, SelectionState::Backfilling)?;
                    debug!(
                        section = %requirement.id,
                        %scope,
                        conflicted = outcome.conflicted.len(),
                        secured = secured.len(),
                        "backfilling after reservation conflict"
                    );
                }
            }

            let available = secured.len() as u32;
            let shortfall = if available < required {
                let shortage = SectionShortage {
                    section: requirement.id.clone(),
                    available,
                    required,
                    preflight_required: self.settings.required_with_margin(required),
                    reason_histogram: histogram,
                };
                if !ctx.template.stakes().tolerates_shortage() {
                    return Err(SelectionError::PoolShortage(ShortageReport {
                        template_id: ctx.template.template_id().clone(),
                        stakes: ctx.template.stakes(),
                        sections: vec![shortage],
                    }));
                }
                warn!(
                    section = %requirement.id,
                    available,
                    required,
                    "practice section under-filled"
                );
                Some(shortage)
            } else {
                None
            };

            for item in &secured {
                ranker.observe(item);
                assigned.insert(item.id.clone());
            }
            assignments.push(SectionAssignment {
                section_id: requirement.id.clone(),
                required,
                items: secured
                    .iter()
                    .map(|item| PinnedItem {
                        item_id: item.id.clone(),
                        version: item.version,
                    })
                    .collect(),
                shortfall,
            });
        }

        ensure_not_cancelled(cancel)?;
        ensure_policy_fresh(ctx.template)?;

        let instance = TestInstance::assemble(
            InstanceId::new(),
            ctx.template.clone(),
            ctx.candidate_id.clone(),
            ctx.organization_id.clone(),
            assignments,
            ctx.seed,
            ctx.now,
        )?;
        self.commit(&instance).await?;
        advance(state, SelectionState::Committed)?;
        Ok(instance)
    }

    /// Writes a `viewed` exposure for every assigned item.
    ///
    /// The ledger is append-only, so rows written before a failure stay under
    /// an instance id the caller never receives; the id is logged and carried
    /// in the error for reconciliation.
    async fn commit(&self, instance: &TestInstance) -> Result<(), SelectionError> {
        let total = instance.item_ids().count();
        let mut written = 0usize;
        for item_id in instance.item_ids() {
            let exposure = NewExposure::viewed(
                item_id.clone(),
                instance.candidate_id().clone(),
                *instance.id(),
                instance.organization_id().clone(),
                *instance.created_at(),
            );
            match self.ledger.record(exposure).await {
                Ok(_) => written += 1,
                Err(LedgerError::DuplicateWrite { .. }) => {
                    debug!(item = %item_id, instance = %instance.id(), "exposure already recorded");
                    written += 1;
                }
                Err(e) => {
                    warn!(
                        instance = %instance.id(),
                        candidate = %instance.candidate_id(),
                        organization = %instance.organization_id(),
                        written,
                        total,
                        error = %e,
                        "commit aborted; orphaned viewed exposures need reconciliation"
                    );
                    return Err(SelectionError::infrastructure(format!(
                        "exposure ledger: {} (instance {} left {} of {} exposures recorded)",
                        e,
                        instance.id(),
                        written,
                        total
                    )));
                }
            }
        }
        Ok(())
    }
}

fn advance(state: &mut SelectionState, next: SelectionState) -> Result<(), SelectionError> {
    state
        .advance(next)
        .map_err(|e| SelectionError::infrastructure(e.to_string()))
}

fn ensure_policy_fresh(template: &TemplateSnapshot) -> Result<(), SelectionError> {
    if template.verify_policy() {
        return Ok(());
    }
    Err(SelectionError::StalePolicySnapshot {
        template_id: template.template_id().clone(),
        pinned: template.policy_digest().to_string(),
        found: template.current_policy_digest(),
    })
}

fn ensure_not_cancelled(cancel: &watch::Receiver<bool>) -> Result<(), SelectionError> {
    if *cancel.borrow() {
        return Err(SelectionError::Cancelled);
    }
    Ok(())
}

fn ledger_failure(e: LedgerError) -> SelectionError {
    SelectionError::infrastructure(format!("exposure ledger: {}", e))
}

fn coordinator_failure(e: ReservationExhausted) -> SelectionError {
    SelectionError::ReservationTimeout {
        attempts: e.attempts,
        message: e.source.to_string(),
    }
}
