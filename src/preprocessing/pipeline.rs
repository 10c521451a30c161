//! Feature preprocessing pipeline
//!
//! Output layout, fixed at fit time:
//! `[standardized numerics | one-hot groups | binary passthrough]`.

use crate::data::{PatientRecord, BINARY_FEATURES, CATEGORICAL_FEATURES, NUMERIC_FEATURES, TARGET};
use crate::error::{Result, RiskError};
use super::encoder::OneHotEncoder;
use super::scaler::{numeric_column, StandardScaler};
use ndarray::{concatenate, Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Fitted transform from patient features to the model's input vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePreprocessor {
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    passthrough: Vec<String>,
    is_fitted: bool,
}

impl Default for FeaturePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeaturePreprocessor {
    pub fn new() -> Self {
        Self {
            scaler: StandardScaler::new(),
            encoder: OneHotEncoder::new(true),
            passthrough: BINARY_FEATURES.iter().map(|s| s.to_string()).collect(),
            is_fitted: false,
        }
    }

    /// Fit scaler and encoder on the feature columns of `df`
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let start = Instant::now();

        self.scaler.fit(df, &NUMERIC_FEATURES)?;
        self.encoder.fit(df, &CATEGORICAL_FEATURES)?;
        for col in &self.passthrough {
            // Validate presence and non-null now rather than at first transform
            numeric_column(df, col)?;
        }

        self.is_fitted = true;
        debug!(
            rows = df.height(),
            n_features_out = self.n_features_out(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Preprocessor fitted"
        );
        Ok(self)
    }

    /// Transform feature columns into an `n_rows x n_features_out` matrix
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(RiskError::ModelNotFitted);
        }

        let numeric = self.scaler.transform(df)?;
        let categorical = self.encoder.transform(df)?;

        let mut binary = Array2::zeros((df.height(), self.passthrough.len()));
        for (j, col) in self.passthrough.iter().enumerate() {
            for (i, v) in numeric_column(df, col)?.into_iter().enumerate() {
                binary[[i, j]] = v;
            }
        }

        let out = concatenate(Axis(1), &[numeric.view(), categorical.view(), binary.view()])?;
        Ok(out)
    }

    /// Fit, transform, and extract the `liver_cancer` labels
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<(Array2<f64>, Array1<f64>)> {
        self.fit(df)?;
        let x = self.transform(df)?;
        let y = Array1::from(numeric_column(df, TARGET)?);
        Ok((x, y))
    }

    /// Transform a single record into one feature vector
    pub fn transform_record(&self, record: &PatientRecord) -> Result<Array1<f64>> {
        let frame = PatientRecord::to_frame(std::slice::from_ref(record))?;
        let x = self.transform(&frame)?;
        Ok(x.row(0).to_owned())
    }

    /// Width of the transformed feature vector
    pub fn n_features_out(&self) -> usize {
        self.scaler.n_features_out() + self.encoder.n_features_out() + self.passthrough.len()
    }

    /// Names of the output columns in order
    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scaler.params().iter().map(|p| p.column.clone()).collect();
        names.extend(self.encoder.feature_names_out());
        names.extend(self.passthrough.iter().cloned());
        names
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    /// Serialize to JSON bytes
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Deserialize from JSON bytes
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Save the preprocessor to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a preprocessor from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::create_synthetic_data;

    fn record(gender: &str, smoking: &str) -> PatientRecord {
        PatientRecord {
            age: 50,
            gender: gender.to_string(),
            bmi: 25.0,
            alcohol_consumption: "Light".to_string(),
            smoking_status: smoking.to_string(),
            hepatitis_b: 1,
            hepatitis_c: 0,
            liver_function_score: 50.0,
            alpha_fetoprotein_level: 10.0,
            cirrhosis_history: 0,
            family_history_cancer: 1,
            physical_activity_level: "High".to_string(),
            diabetes: 0,
        }
    }

    #[test]
    fn test_output_layout() {
        let df = create_synthetic_data().unwrap();
        let mut pre = FeaturePreprocessor::new();
        let (x, y) = pre.fit_transform(&df).unwrap();

        assert_eq!(x.dim(), (1000, 17));
        assert_eq!(y.len(), 1000);
        assert_eq!(pre.n_features_out(), 17);
        assert_eq!(
            pre.feature_names_out(),
            vec![
                "age",
                "bmi",
                "liver_function_score",
                "alpha_fetoprotein_level",
                "gender_Male",
                "alcohol_consumption_Light",
                "alcohol_consumption_Moderate",
                "alcohol_consumption_None",
                "smoking_status_Former",
                "smoking_status_Never",
                "physical_activity_level_Low",
                "physical_activity_level_Moderate",
                "hepatitis_b",
                "hepatitis_c",
                "cirrhosis_history",
                "family_history_cancer",
                "diabetes",
            ]
        );
    }

    #[test]
    fn test_record_vector() {
        let df = create_synthetic_data().unwrap();
        let mut pre = FeaturePreprocessor::new();
        pre.fit(&df).unwrap();

        let v = pre.transform_record(&record("Male", "Never")).unwrap();
        assert_eq!(v.len(), 17);
        // gender_Male, alcohol Light, smoking Never, activity High (dropped reference)
        assert_eq!(v[4], 1.0);
        assert_eq!(v.slice(ndarray::s![5..8]).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(v.slice(ndarray::s![8..10]).to_vec(), vec![0.0, 1.0]);
        assert_eq!(v.slice(ndarray::s![10..12]).to_vec(), vec![0.0, 0.0]);
        assert_eq!(v.slice(ndarray::s![12..17]).to_vec(), vec![1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unknown_category_zero_group() {
        let df = create_synthetic_data().unwrap();
        let mut pre = FeaturePreprocessor::new();
        pre.fit(&df).unwrap();

        let v = pre.transform_record(&record("Other", "Sometimes")).unwrap();
        assert_eq!(v[4], 0.0);
        assert_eq!(v.slice(ndarray::s![8..10]).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_refit_is_reproducible() {
        let df = create_synthetic_data().unwrap();
        let mut a = FeaturePreprocessor::new();
        let mut b = FeaturePreprocessor::new();
        a.fit(&df).unwrap();
        b.fit(&df).unwrap();

        assert_eq!(a, b);
        let r = record("Female", "Current");
        assert_eq!(a.transform_record(&r).unwrap(), b.transform_record(&r).unwrap());
    }

    #[test]
    fn test_json_round_trip_is_exact() {
        let df = create_synthetic_data().unwrap();
        let mut pre = FeaturePreprocessor::new();
        pre.fit(&df).unwrap();

        let restored = FeaturePreprocessor::from_json(&pre.to_json().unwrap()).unwrap();
        assert_eq!(pre, restored);
        let r = record("Male", "Former");
        assert_eq!(pre.transform_record(&r).unwrap(), restored.transform_record(&r).unwrap());
    }

    #[test]
    fn test_transform_before_fit() {
        let pre = FeaturePreprocessor::new();
        let err = pre.transform_record(&record("Male", "Never")).unwrap_err();
        assert!(matches!(err, RiskError::ModelNotFitted));
    }

    #[test]
    fn test_missing_feature_column() {
        let df = create_synthetic_data().unwrap().drop("diabetes").unwrap();
        let mut pre = FeaturePreprocessor::new();
        assert!(matches!(pre.fit(&df), Err(RiskError::FeatureNotFound(_))));
    }
}
