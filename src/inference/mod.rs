//! Inference module
//!
//! Scores a single patient record against the saved artifacts and maps the
//! probability to a percentage plus a clinical message.

mod predictor;

pub use predictor::{assess, Predictor, RiskAssessment, RiskScorer, FOLLOW_UP_MESSAGE, URGENT_MESSAGE};
