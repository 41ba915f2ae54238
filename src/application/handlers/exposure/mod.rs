//! Exposure handlers.

mod record_answer;

pub use record_answer::{RecordAnswerCommand, RecordAnswerHandler};
