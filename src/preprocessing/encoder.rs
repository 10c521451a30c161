//! One-hot encoding of categorical columns

use crate::error::{Result, RiskError};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted vocabulary of one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub column: String,
    /// Every category seen during fit, sorted
    pub categories: Vec<String>,
}

impl CategoryMapping {
    /// Categories that get an output column (the reference category is dropped)
    pub fn encoded_categories(&self, drop_first: bool) -> &[String] {
        if drop_first && !self.categories.is_empty() {
            &self.categories[1..]
        } else {
            &self.categories
        }
    }
}

/// One-hot encoder
///
/// Unknown categories, and the dropped reference category, encode as an
/// all-zero group instead of raising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    mappings: Vec<CategoryMapping>,
    drop_first: bool,
    is_fitted: bool,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl OneHotEncoder {
    pub fn new(drop_first: bool) -> Self {
        Self {
            mappings: Vec::new(),
            drop_first,
            is_fitted: false,
        }
    }

    /// Fit the encoder to the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.mappings.clear();

        for col_name in columns {
            let values = string_column(df, col_name)?;
            let mut categories: Vec<String> = values;
            categories.sort();
            categories.dedup();

            if categories.is_empty() {
                return Err(RiskError::PreprocessingError(format!(
                    "cannot fit encoder on empty column '{}'",
                    col_name
                )));
            }

            self.mappings.push(CategoryMapping {
                column: col_name.to_string(),
                categories,
            });
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Encode the fitted columns, groups in fit order
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(RiskError::ModelNotFitted);
        }

        let mut out = Array2::zeros((df.height(), self.n_features_out()));
        let mut offset = 0;

        for mapping in &self.mappings {
            let encoded = mapping.encoded_categories(self.drop_first);
            let values = string_column(df, &mapping.column)?;

            for (i, value) in values.iter().enumerate() {
                if let Some(k) = encoded.iter().position(|c| c == value) {
                    out[[i, offset + k]] = 1.0;
                }
            }

            offset += encoded.len();
        }

        Ok(out)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<Array2<f64>> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    pub fn n_features_out(&self) -> usize {
        self.mappings
            .iter()
            .map(|m| m.encoded_categories(self.drop_first).len())
            .sum()
    }

    /// Output column names as `<column>_<category>`
    pub fn feature_names_out(&self) -> Vec<String> {
        self.mappings
            .iter()
            .flat_map(|m| {
                m.encoded_categories(self.drop_first)
                    .iter()
                    .map(move |c| format!("{}_{}", m.column, c))
            })
            .collect()
    }

    pub fn mappings(&self) -> &[CategoryMapping] {
        &self.mappings
    }
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| RiskError::FeatureNotFound(name.to_string()))?;
    let ca = column.as_materialized_series().str()?;

    ca.into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.map(str::to_string).ok_or_else(|| {
                RiskError::InvalidInput(format!("column '{}' has a null value at row {}", name, i))
            })
        })
        .collect()
}
