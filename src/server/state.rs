//! Application state management

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::inference::{Predictor, RiskScorer};
use crate::registry::{FsModelRegistry, ModelRegistry};

use super::ServerConfig;

/// Application state shared across handlers
pub struct AppState {
    pub scorer: Arc<dyn RiskScorer>,
    /// Backing registry, when the scorer is a registry predictor
    pub registry: Option<Arc<dyn ModelRegistry>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// State backed by the artifact directory in `config`
    pub fn new(config: &ServerConfig) -> Self {
        let registry: Arc<dyn ModelRegistry> = Arc::new(FsModelRegistry::new(&config.models_dir));
        Self::with_registry(registry)
    }

    pub fn with_registry(registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            scorer: Arc::new(Predictor::new(Arc::clone(&registry))),
            registry: Some(registry),
            started_at: Utc::now(),
        }
    }

    /// State around any scorer, without a registry
    pub fn with_scorer(scorer: Arc<dyn RiskScorer>) -> Self {
        Self {
            scorer,
            registry: None,
            started_at: Utc::now(),
        }
    }
}
