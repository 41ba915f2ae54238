//! Reservation store adapters.
//!
//! - `InMemoryReservationStore` - Single-process, mutex-guarded claims
//! - `RedisReservationStore` - Shared claims using `SET NX PX`

mod in_memory;
mod redis;

pub use in_memory::InMemoryReservationStore;
pub use self::redis::RedisReservationStore;
