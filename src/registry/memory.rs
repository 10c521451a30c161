//! In-process registry

use std::path::PathBuf;

use parking_lot::RwLock;

use super::{check_compatible, ArtifactManifest, ModelRegistry};
use crate::error::{Result, RiskError};
use crate::model::ModelWeights;
use crate::preprocessing::FeaturePreprocessor;

#[derive(Debug, Clone)]
struct Stored {
    preprocessor: FeaturePreprocessor,
    weights: ModelWeights,
    manifest: ArtifactManifest,
}

/// Keeps the artifact pair in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryModelRegistry {
    inner: RwLock<Option<Stored>>,
}

impl MemoryModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the stored pair
    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}

impl ModelRegistry for MemoryModelRegistry {
    fn save(&self, preprocessor: &FeaturePreprocessor, weights: &ModelWeights) -> Result<ArtifactManifest> {
        check_compatible(preprocessor, weights)?;

        let preprocessor_bytes = preprocessor.to_json()?;
        let model_bytes = bincode::serialize(weights)?;

        let mut guard = self.inner.write();
        let version = guard.as_ref().map_or(1, |s| s.manifest.version + 1);
        let manifest =
            ArtifactManifest::describe(version, preprocessor, weights, &preprocessor_bytes, &model_bytes);

        *guard = Some(Stored {
            preprocessor: preprocessor.clone(),
            weights: weights.clone(),
            manifest: manifest.clone(),
        });
        Ok(manifest)
    }

    fn load(&self) -> Result<(FeaturePreprocessor, ModelWeights)> {
        let guard = self.inner.read();
        let stored = guard.as_ref().ok_or_else(|| RiskError::ArtifactMissing {
            path: PathBuf::from(self.location()),
        })?;
        Ok((stored.preprocessor.clone(), stored.weights.clone()))
    }

    fn manifest(&self) -> Result<Option<ArtifactManifest>> {
        Ok(self.inner.read().as_ref().map(|s| s.manifest.clone()))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
