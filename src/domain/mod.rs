//! Domain layer containing selection rules and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `item` - Published items and their taxonomy tags
//! - `exposure` - Exposure ledger records
//! - `policy` - Repetition policy and the pure eligibility evaluator
//! - `selection` - Template snapshots, ranking, shortage reports, test instances
//! - `pool_health` - Advisory pool size reports

pub mod exposure;
pub mod foundation;
pub mod item;
pub mod policy;
pub mod pool_health;
pub mod selection;
