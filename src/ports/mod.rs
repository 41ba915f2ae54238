//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the selection domain and its stores. Adapters implement these ports.
//!
//! - `ExposureLedger` - Durable, append-only exposure history
//! - `PoolIndex` - Read view of published items by taxonomy
//! - `ReservationStore` - Atomic short-lived claims with TTL

mod exposure_ledger;
mod pool_index;
mod reservation_store;

pub use exposure_ledger::{ExposureLedger, LedgerError};
pub use pool_index::{PoolIndex, PoolIndexError};
pub use reservation_store::{ClaimOutcome, ReservationError, ScopeKey, ReservationStore};
