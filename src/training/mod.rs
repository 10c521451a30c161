//! Model training module
//!
//! Fits the preprocessor and the risk network on a loaded dataset:
//! - Seeded 80/20 train/validation split
//! - Mini-batch Adam on binary cross-entropy
//! - Accuracy and ROC AUC over the full dataset after training

mod metrics;
mod split;
mod trainer;

pub use metrics::{accuracy, binary_cross_entropy, roc_auc, ClassificationMetrics};
pub use split::{train_val_split, SplitIndices};
pub use trainer::{TrainedArtifacts, Trainer};

use crate::data::loader::DEFAULT_SQL_FILE;
use crate::error::{Result, RiskError};
use crate::model::NetworkConfig;
use crate::registry::ArtifactManifest;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// SQL script with the training table
    pub sql_file: PathBuf,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Fraction of rows held out, rounded up
    pub validation_split: f64,
    /// Seed for the split, batch shuffling and dropout
    pub seed: u64,
    /// Log losses every this many epochs
    pub log_every: usize,
    pub network: NetworkConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            sql_file: PathBuf::from(DEFAULT_SQL_FILE),
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            validation_split: 0.2,
            seed: 42,
            log_every: 10,
            network: NetworkConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sql_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sql_file = path.into();
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_validation_split(mut self, split: f64) -> Self {
        self.validation_split = split;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_log_every(mut self, every: usize) -> Self {
        self.log_every = every;
        self
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Reject settings the training loop cannot run with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("log_every", self.log_every),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(RiskError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }

        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(RiskError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be a positive number".to_string(),
            });
        }

        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(RiskError::InvalidParameter {
                name: "validation_split".to_string(),
                value: self.validation_split.to_string(),
                reason: "must be in [0, 1)".to_string(),
            });
        }

        Ok(())
    }
}

/// Mean losses for one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochLoss {
    /// 1-based epoch number
    pub epoch: usize,
    pub train_loss: f64,
    /// `None` when no rows were held out
    pub val_loss: Option<f64>,
}

/// Outcome of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub history: Vec<EpochLoss>,
    /// Evaluated on the full dataset
    pub metrics: ClassificationMetrics,
    pub n_samples: usize,
    pub n_features: usize,
    pub n_train: usize,
    pub n_validation: usize,
    pub training_time_secs: f64,
    /// Where the rows came from, when loaded through the SQL loader
    pub data_source: Option<String>,
    /// Set once the artifacts are saved
    pub manifest: Option<ArtifactManifest>,
}

impl TrainingReport {
    pub fn accuracy(&self) -> f64 {
        self.metrics.accuracy
    }

    pub fn auc_roc(&self) -> Option<f64> {
        self.metrics.auc_roc
    }

    pub fn final_loss(&self) -> Option<&EpochLoss> {
        self.history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 50);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.validation_split, 0.2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.log_every, 10);
        assert_eq!(config.network.hidden_layers, vec![64, 32]);
        assert_eq!(config.sql_file, PathBuf::from("data/synthetic_liver_cancer_dataset.sql"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = TrainingConfig::new()
            .with_epochs(5)
            .with_batch_size(8)
            .with_learning_rate(0.01)
            .with_sql_file("other.sql");
        assert_eq!(config.epochs, 5);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.sql_file, PathBuf::from("other.sql"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(TrainingConfig::new().with_epochs(0).validate().is_err());
        assert!(TrainingConfig::new().with_batch_size(0).validate().is_err());
        assert!(TrainingConfig::new().with_learning_rate(-1.0).validate().is_err());
        assert!(TrainingConfig::new().with_validation_split(1.0).validate().is_err());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = TrainingConfig::new().with_seed(7);
        let json = serde_json::to_string(&config).unwrap();
        let back: TrainingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
