//! Persistence of trained artifacts
//!
//! A registry stores the fitted preprocessor and the network weights as one
//! unit. Loading always returns a matching pair or an error; there is no
//! partial result.

mod fs;
mod memory;

pub use fs::FsModelRegistry;
pub use memory::MemoryModelRegistry;

use crate::error::{Result, RiskError};
use crate::model::ModelWeights;
use crate::preprocessing::FeaturePreprocessor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Preprocessor file name
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
/// Network weights file name
pub const MODEL_FILE: &str = "risk_model.bin";
/// Manifest file name
pub const MANIFEST_FILE: &str = "manifest.json";

/// Description of one saved artifact pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Incremented on every save
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub input_dim: usize,
    pub feature_names: Vec<String>,
    /// xxh3-64 of the serialized preprocessor
    pub preprocessor_fingerprint: String,
    /// xxh3-64 of the serialized weights
    pub model_fingerprint: String,
    pub n_parameters: usize,
}

impl ArtifactManifest {
    pub(crate) fn describe(
        version: u64,
        preprocessor: &FeaturePreprocessor,
        weights: &ModelWeights,
        preprocessor_bytes: &[u8],
        model_bytes: &[u8],
    ) -> Self {
        Self {
            version,
            created_at: Utc::now(),
            input_dim: weights.input_dim,
            feature_names: preprocessor.feature_names_out(),
            preprocessor_fingerprint: fingerprint(preprocessor_bytes),
            model_fingerprint: fingerprint(model_bytes),
            n_parameters: weights.n_parameters(),
        }
    }
}

/// Storage for the preprocessor/weights pair
pub trait ModelRegistry: Send + Sync {
    /// Persist both artifacts, replacing any previous pair
    fn save(&self, preprocessor: &FeaturePreprocessor, weights: &ModelWeights) -> Result<ArtifactManifest>;

    /// Load the current pair
    fn load(&self) -> Result<(FeaturePreprocessor, ModelWeights)>;

    /// Manifest of the current pair, if one has been saved
    fn manifest(&self) -> Result<Option<ArtifactManifest>>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// Hex xxh3-64 digest
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:016x}", xxh3_64(bytes))
}

/// The pair must agree on the feature width and the weights must chain
pub(crate) fn check_compatible(preprocessor: &FeaturePreprocessor, weights: &ModelWeights) -> Result<()> {
    if !preprocessor.is_fitted() {
        return Err(RiskError::ModelNotFitted);
    }
    let width = preprocessor.n_features_out();
    if weights.input_dim != width {
        return Err(RiskError::ShapeError {
            expected: format!("model input width {} (preprocessor output)", width),
            actual: weights.input_dim.to_string(),
        });
    }
    weights.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = fingerprint(b"weights");
        assert_eq!(a.len(), 16);
        assert_eq!(a, fingerprint(b"weights"));
        assert_ne!(a, fingerprint(b"weights!"));
    }
}
