//! Training loop

use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, info};

use super::metrics::{binary_cross_entropy, ClassificationMetrics};
use super::split::train_val_split;
use super::{EpochLoss, TrainingConfig, TrainingReport};
use crate::data::load_data_from_sql;
use crate::error::{Result, RiskError};
use crate::model::{Adam, ModelWeights, RiskNetwork};
use crate::preprocessing::FeaturePreprocessor;
use crate::registry::ModelRegistry;

/// Fitted preprocessor and network weights plus the run report
#[derive(Debug, Clone)]
pub struct TrainedArtifacts {
    pub preprocessor: FeaturePreprocessor,
    pub weights: ModelWeights,
    pub report: TrainingReport,
}

/// Drives loading, fitting and saving
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load the dataset, train, and save both artifacts to `registry`
    pub async fn run(&self, registry: Arc<dyn ModelRegistry>) -> Result<TrainedArtifacts> {
        self.config.validate()?;

        let dataset = load_data_from_sql(&self.config.sql_file).await?;
        let source = dataset.source.to_string();
        info!(source = %source, rows = dataset.frame.height(), "Training data ready");

        let trainer = self.clone();
        let frame = dataset.frame;
        let artifacts = tokio::task::spawn_blocking(move || trainer.train_frame(&frame))
            .await
            .map_err(|e| RiskError::TrainingError(format!("training task failed: {}", e)))??;

        let store = Arc::clone(&registry);
        let (mut artifacts, manifest) = tokio::task::spawn_blocking(move || {
            let manifest = store.save(&artifacts.preprocessor, &artifacts.weights)?;
            Ok::<_, RiskError>((artifacts, manifest))
        })
        .await
        .map_err(|e| RiskError::TrainingError(format!("artifact save task failed: {}", e)))??;
        info!(
            version = manifest.version,
            location = %registry.location(),
            "Artifacts saved"
        );

        artifacts.report.data_source = Some(source);
        artifacts.report.manifest = Some(manifest);
        Ok(artifacts)
    }

    /// Fit preprocessor and network on an in-memory frame
    pub fn train_frame(&self, df: &DataFrame) -> Result<TrainedArtifacts> {
        self.config.validate()?;
        let start = Instant::now();

        let mut preprocessor = FeaturePreprocessor::new();
        let (x, y) = preprocessor.fit_transform(df)?;
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        let split = train_val_split(n_samples, self.config.validation_split, &mut rng)?;
        let x_train = gather_rows(&x, &split.train);
        let y_train = gather_labels(&y, &split.train);
        let x_val = gather_rows(&x, &split.validation);
        let y_val = gather_labels(&y, &split.validation);

        info!(
            samples = n_samples,
            features = n_features,
            train = split.train.len(),
            validation = split.validation.len(),
            epochs = self.config.epochs,
            "Starting training"
        );

        let mut network = RiskNetwork::new(n_features, self.config.network.clone())?;
        let mut optimizer = Adam::with_learning_rate(self.config.learning_rate);
        let mut history = Vec::with_capacity(self.config.epochs);
        let batch_size = self.config.batch_size;

        let mut order: Vec<usize> = (0..x_train.nrows()).collect();
        for epoch in 1..=self.config.epochs {
            order.shuffle(&mut rng);

            let mut batch_losses = Vec::new();
            for batch in order.chunks(batch_size) {
                let xb = gather_rows(&x_train, batch);
                let yb = gather_labels(&y_train, batch);

                let pass = network.forward_train(&xb, &mut rng)?;
                batch_losses.push(binary_cross_entropy(&yb, pass.probabilities()));
                let gradients = network.backward(&pass, &yb)?;
                optimizer.step(&mut network, &gradients)?;
            }
            let train_loss = mean(&batch_losses);

            let val_loss = if x_val.nrows() > 0 {
                let mut losses = Vec::new();
                let mut offset = 0;
                while offset < x_val.nrows() {
                    let end = (offset + batch_size).min(x_val.nrows());
                    let xb = x_val.slice(ndarray::s![offset..end, ..]).to_owned();
                    let yb = y_val.slice(ndarray::s![offset..end]).to_owned();
                    losses.push(binary_cross_entropy(&yb, &network.predict_proba(&xb)?));
                    offset = end;
                }
                Some(mean(&losses))
            } else {
                None
            };

            if !train_loss.is_finite() {
                return Err(RiskError::TrainingError(format!(
                    "loss diverged at epoch {}",
                    epoch
                )));
            }

            if epoch % self.config.log_every == 0 {
                info!(
                    epoch,
                    epochs = self.config.epochs,
                    train_loss = %format!("{:.4}", train_loss),
                    val_loss = %val_loss.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "n/a".into()),
                    "Epoch complete"
                );
            } else {
                debug!(epoch, train_loss, ?val_loss, "Epoch complete");
            }

            history.push(EpochLoss {
                epoch,
                train_loss,
                val_loss,
            });
        }

        let probabilities = network.predict_proba(&x)?;
        let metrics = ClassificationMetrics::compute(&y, &probabilities);
        let training_time_secs = start.elapsed().as_secs_f64();

        info!(
            accuracy = %format!("{:.4}", metrics.accuracy),
            auc = %metrics.auc_roc.map(|a| format!("{:.4}", a)).unwrap_or_else(|| "n/a".into()),
            elapsed_secs = %format!("{:.2}", training_time_secs),
            "Training finished"
        );

        Ok(TrainedArtifacts {
            preprocessor,
            weights: network.weights(),
            report: TrainingReport {
                history,
                metrics,
                n_samples,
                n_features,
                n_train: split.train.len(),
                n_validation: split.validation.len(),
                training_time_secs,
                data_source: None,
                manifest: None,
            },
        })
    }
}

fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    x.select(Axis(0), indices)
}

fn gather_labels(y: &Array1<f64>, indices: &[usize]) -> Array1<f64> {
    indices.iter().map(|&i| y[i]).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{generate, SyntheticConfig};

    fn quick_config() -> TrainingConfig {
        TrainingConfig::new().with_epochs(3).with_log_every(1)
    }

    #[test]
    fn test_train_frame_shapes() {
        let df = generate(&SyntheticConfig::new().with_samples(200)).unwrap();
        let artifacts = Trainer::new(quick_config()).train_frame(&df).unwrap();

        let report = &artifacts.report;
        assert_eq!(report.history.len(), 3);
        assert_eq!(report.n_samples, 200);
        assert_eq!(report.n_features, 17);
        assert_eq!(report.n_validation, 40);
        assert_eq!(report.n_train, 160);
        assert!(report.history.iter().all(|e| e.train_loss.is_finite() && e.val_loss.is_some()));
        assert!((0.0..=1.0).contains(&report.accuracy()));
        assert_eq!(artifacts.weights.input_dim, artifacts.preprocessor.n_features_out());
        assert!(report.manifest.is_none());
    }

    #[test]
    fn test_train_frame_is_deterministic() {
        let df = generate(&SyntheticConfig::new().with_samples(120)).unwrap();
        let a = Trainer::new(quick_config()).train_frame(&df).unwrap();
        let b = Trainer::new(quick_config()).train_frame(&df).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.report.history, b.report.history);
    }

    #[test]
    fn test_no_validation_rows() {
        let df = generate(&SyntheticConfig::new().with_samples(50)).unwrap();
        let config = quick_config().with_validation_split(0.0);
        let artifacts = Trainer::new(config).train_frame(&df).unwrap();
        assert_eq!(artifacts.report.n_validation, 0);
        assert!(artifacts.report.history.iter().all(|e| e.val_loss.is_none()));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let df = generate(&SyntheticConfig::new().with_samples(20)).unwrap();
        let err = Trainer::new(quick_config().with_batch_size(0)).train_frame(&df).unwrap_err();
        assert!(matches!(err, RiskError::InvalidParameter { .. }));
    }

    #[test]
    fn test_gather_rows() {
        let x = ndarray::array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        assert_eq!(gather_rows(&x, &[2, 0]), ndarray::array![[5.0, 6.0], [1.0, 2.0]]);
    }

    #[tokio::test]
    async fn test_run_saves_through_shared_registry() {
        use crate::data::render_sql_script;
        use crate::registry::MemoryModelRegistry;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("data.sql");
        let df = generate(&SyntheticConfig::new().with_samples(60)).unwrap();
        std::fs::write(&script, render_sql_script(&df).unwrap()).unwrap();

        let registry = Arc::new(MemoryModelRegistry::new());
        let config = quick_config().with_sql_file(&script);
        let artifacts = Trainer::new(config).run(registry.clone()).await.unwrap();

        assert_eq!(artifacts.report.manifest.as_ref().unwrap().version, 1);
        let (_, weights) = registry.load().unwrap();
        assert_eq!(weights, artifacts.weights);
    }
}
