//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - in-process ledger and pool index (tests, single node, seed files)
//! - `postgres` - durable ledger and pool index
//! - `reservation` - claim stores (in-process and Redis)
//! - `http` - axum REST surface

pub mod http;
pub mod memory;
pub mod postgres;
pub mod reservation;
