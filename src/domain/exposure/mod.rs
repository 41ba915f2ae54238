//! Exposure module - append-only record of what each candidate has seen.

mod record;

pub use record::{
    ExposureOutcome, ExposureRecord, ExposureResult, ItemExposureStats, NewExposure,
};
