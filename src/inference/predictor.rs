//! Per-request risk prediction

use std::sync::Arc;
use std::time::Instant;

use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::PatientRecord;
use crate::error::{Result, RiskError};
use crate::model::RiskNetwork;
use crate::registry::ModelRegistry;

/// Shown when the rounded risk is at most 50%
pub const FOLLOW_UP_MESSAGE: &str = "Recomendación de seguimiento/chequeos.";
/// Shown when the rounded risk is above 50%
pub const URGENT_MESSAGE: &str = "Alerta: Cita clínica inmediata.";

/// Anything that turns a patient record into a probability
pub trait RiskScorer: Send + Sync {
    fn predict(&self, record: &PatientRecord) -> Result<f64>;
}

/// Scores records with the artifacts currently in a registry
///
/// Artifacts are loaded on every call, so a retrain is picked up by the
/// next request without a restart.
#[derive(Clone)]
pub struct Predictor {
    registry: Arc<dyn ModelRegistry>,
}

impl Predictor {
    pub fn new(registry: Arc<dyn ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn ModelRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("registry", &self.registry.location())
            .finish()
    }
}

impl RiskScorer for Predictor {
    fn predict(&self, record: &PatientRecord) -> Result<f64> {
        let start = Instant::now();
        let (preprocessor, weights) = self.registry.load()?;

        let features = preprocessor.transform_record(record)?;
        let network = RiskNetwork::from_weights(weights)?;
        let probabilities = network.predict_proba(&features.insert_axis(Axis(0)))?;

        let p = probabilities
            .first()
            .copied()
            .ok_or_else(|| RiskError::InferenceError("model produced no output".to_string()))?;
        if p.is_nan() {
            return Err(RiskError::InferenceError("model produced NaN".to_string()));
        }

        debug!(
            probability = p,
            latency_us = start.elapsed().as_micros() as u64,
            "Prediction complete"
        );
        Ok(p.clamp(0.0, 1.0))
    }
}

/// API-facing result of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Probability as a percentage, two decimals
    pub risk_percentage: f64,
    pub clinical_message: String,
}

impl RiskAssessment {
    /// Choose the message from the exact percentage, then round it to two decimals
    pub fn from_probability(probability: f64) -> Self {
        let exact = probability.clamp(0.0, 1.0) * 100.0;
        let risk_percentage = (exact * 100.0).round() / 100.0;
        let clinical_message = if exact > 50.0 {
            URGENT_MESSAGE
        } else {
            FOLLOW_UP_MESSAGE
        };

        Self {
            risk_percentage,
            clinical_message: clinical_message.to_string(),
        }
    }

    pub fn is_urgent(&self) -> bool {
        self.clinical_message == URGENT_MESSAGE
    }
}

/// Score one record and wrap it for the API
pub fn assess(scorer: &dyn RiskScorer, record: &PatientRecord) -> Result<RiskAssessment> {
    scorer.predict(record).map(RiskAssessment::from_probability)
}
