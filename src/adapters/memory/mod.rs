//! In-memory adapters for the exposure ledger and pool index.

mod exposure_ledger;
mod pool_index;

pub use exposure_ledger::InMemoryExposureLedger;
pub use pool_index::InMemoryPoolIndex;
