//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::data::PatientRecord;
use crate::inference::{assess, RiskAssessment};

use super::error::{Result, ServerError};
use super::state::AppState;

/// Score one patient
///
/// Artifact loading and the forward pass run on the blocking pool.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<PatientRecord>, JsonRejection>,
) -> Result<Json<RiskAssessment>> {
    let Json(record) = payload?;

    let scorer = Arc::clone(&state.scorer);
    let assessment = tokio::task::spawn_blocking(move || assess(scorer.as_ref(), &record))
        .await
        .map_err(|e| ServerError::Internal(format!("prediction task failed: {}", e)))??;

    info!(
        risk_percentage = assessment.risk_percentage,
        urgent = assessment.is_urgent(),
        "Prediction served"
    );
    Ok(Json(assessment))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let model_version = match state.registry.clone() {
        Some(registry) => tokio::task::spawn_blocking(move || registry.manifest())
            .await
            .ok()
            .and_then(|manifest| manifest.ok().flatten())
            .map(|m| m.version),
        None => None,
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_version": model_version,
        "uptime_secs": chrono::Utc::now().signed_duration_since(state.started_at).num_seconds(),
    }))
}
