//! PostgreSQL adapters - Database implementations for the ledger and pool ports.
//!
//! - `PostgresExposureLedger` - Durable exposure ledger
//! - `PostgresPoolIndex` - Published items joined to their taxonomy tags

mod exposure_ledger;
mod pool_index;

pub use exposure_ledger::PostgresExposureLedger;
pub use pool_index::PostgresPoolIndex;
