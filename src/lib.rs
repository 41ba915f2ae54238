//! Question Selection - Deterministic selection and anti-repetition engine
//!
//! Selects correctly-sized, non-repeating, diversity-weighted item sets from
//! a tagged content pool, reserves them against concurrent selections and
//! records every exposure before handing an instance back.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
