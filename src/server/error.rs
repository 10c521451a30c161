//! Error types for the server

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::RiskError;

/// Every error body has the shape `{"detail": "..."}`
#[derive(Error, Debug)]
pub enum ServerError {
    /// Body did not match the patient schema
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },

    /// Scoring failed, including missing artifacts
    #[error("{0}")]
    Prediction(#[from] RiskError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Rejected { status, detail } => {
                tracing::warn!(status = status.as_u16(), detail = %detail, "Request rejected");
                *status
            }
            ServerError::Prediction(e) => {
                tracing::error!(detail = %e, "Prediction failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
