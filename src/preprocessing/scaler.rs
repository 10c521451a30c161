//! Standard scaling of numeric columns

use crate::error::{Result, RiskError};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted parameters for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub column: String,
    /// Column mean
    pub center: f64,
    /// Population standard deviation, 1.0 for constant columns
    pub scale: f64,
}

/// Z-score scaler: (x - mean) / std
///
/// Parameters are kept in fit order so the output layout is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.params.clear();

        for col_name in columns {
            let values = numeric_column(df, col_name)?;
            if values.is_empty() {
                return Err(RiskError::PreprocessingError(format!(
                    "cannot fit scaler on empty column '{}'",
                    col_name
                )));
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

            self.params.push(ScalerParams {
                column: col_name.to_string(),
                center: mean,
                scale: if std == 0.0 { 1.0 } else { std },
            });
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale the fitted columns into an `n_rows x n_columns` matrix
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(RiskError::ModelNotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.params.len()));
        for (j, params) in self.params.iter().enumerate() {
            let values = numeric_column(df, &params.column)?;
            for (i, value) in values.into_iter().enumerate() {
                out[[i, j]] = (value - params.center) / params.scale;
            }
        }

        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    pub fn params(&self) -> &[ScalerParams] {
        &self.params
    }

    pub fn n_features_out(&self) -> usize {
        self.params.len()
    }
}

/// Fetch a column as non-null f64 values
pub(crate) fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| RiskError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let ca = series.f64()?;

    if ca.null_count() > 0 {
        return Err(RiskError::InvalidInput(format!(
            "column '{}' contains {} null values",
            name,
            ca.null_count()
        )));
    }

    Ok(ca.into_no_null_iter().collect())
}
