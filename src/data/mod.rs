//! Patient-record schema and dataset sources
//!
//! Every frame that flows through the pipeline shares one schema: four
//! `Float64` numeric columns, four `String` categorical columns, five `Int64`
//! binary indicators and (for training data) the `Int64` label. The column
//! lists below are the single source of truth for that order.

pub mod loader;
pub mod script;
pub mod synthetic;

pub use loader::{load_data_from_sql, DataIssue, DataSource, LoadedDataset};
pub use script::render_sql_script;
pub use synthetic::{create_synthetic_data, SyntheticConfig};

use crate::error::Result;
use polars::prelude::*;
use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};

/// Continuous features, standardized by the preprocessor
pub const NUMERIC_FEATURES: [&str; 4] = [
    "age",
    "bmi",
    "liver_function_score",
    "alpha_fetoprotein_level",
];

/// Categorical features, one-hot encoded by the preprocessor
pub const CATEGORICAL_FEATURES: [&str; 4] = [
    "gender",
    "alcohol_consumption",
    "smoking_status",
    "physical_activity_level",
];

/// 0/1 indicators, passed through unchanged
pub const BINARY_FEATURES: [&str; 5] = [
    "hepatitis_b",
    "hepatitis_c",
    "cirrhosis_history",
    "family_history_cancer",
    "diabetes",
];

/// Training label
pub const TARGET: &str = "liver_cancer";

/// Name of the table the SQL loader reads
pub const SOURCE_TABLE: &str = "mytable";

/// All 13 feature columns in canonical order
pub fn feature_columns() -> Vec<&'static str> {
    NUMERIC_FEATURES
        .iter()
        .chain(CATEGORICAL_FEATURES.iter())
        .chain(BINARY_FEATURES.iter())
        .copied()
        .collect()
}

/// One patient as accepted by the prediction API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub age: u32,
    pub gender: String,
    pub bmi: f64,
    pub alcohol_consumption: String,
    pub smoking_status: String,
    #[serde(deserialize_with = "binary_flag")]
    pub hepatitis_b: u8,
    #[serde(deserialize_with = "binary_flag")]
    pub hepatitis_c: u8,
    pub liver_function_score: f64,
    pub alpha_fetoprotein_level: f64,
    #[serde(deserialize_with = "binary_flag")]
    pub cirrhosis_history: u8,
    #[serde(deserialize_with = "binary_flag")]
    pub family_history_cancer: u8,
    pub physical_activity_level: String,
    #[serde(deserialize_with = "binary_flag")]
    pub diabetes: u8,
}

fn binary_flag<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = u8::deserialize(deserializer)?;
    if value > 1 {
        return Err(de::Error::invalid_value(
            Unexpected::Unsigned(u64::from(value)),
            &"0 or 1",
        ));
    }
    Ok(value)
}

impl PatientRecord {
    /// Build a feature frame (no label column) from records, in canonical column order
    pub fn to_frame(records: &[PatientRecord]) -> Result<DataFrame> {
        fn floats(records: &[PatientRecord], f: impl Fn(&PatientRecord) -> f64) -> Vec<f64> {
            records.iter().map(f).collect()
        }
        fn texts(records: &[PatientRecord], f: impl Fn(&PatientRecord) -> &String) -> Vec<String> {
            records.iter().map(|r| f(r).clone()).collect()
        }
        fn flags(records: &[PatientRecord], f: impl Fn(&PatientRecord) -> u8) -> Vec<i64> {
            records.iter().map(|r| i64::from(f(r))).collect()
        }

        let df = DataFrame::new(vec![
            Series::new("age".into(), floats(records, |r| f64::from(r.age))).into(),
            Series::new("bmi".into(), floats(records, |r| r.bmi)).into(),
            Series::new("liver_function_score".into(), floats(records, |r| r.liver_function_score)).into(),
            Series::new("alpha_fetoprotein_level".into(), floats(records, |r| r.alpha_fetoprotein_level)).into(),
            Series::new("gender".into(), texts(records, |r| &r.gender)).into(),
            Series::new("alcohol_consumption".into(), texts(records, |r| &r.alcohol_consumption)).into(),
            Series::new("smoking_status".into(), texts(records, |r| &r.smoking_status)).into(),
            Series::new("physical_activity_level".into(), texts(records, |r| &r.physical_activity_level)).into(),
            Series::new("hepatitis_b".into(), flags(records, |r| r.hepatitis_b)).into(),
            Series::new("hepatitis_c".into(), flags(records, |r| r.hepatitis_c)).into(),
            Series::new("cirrhosis_history".into(), flags(records, |r| r.cirrhosis_history)).into(),
            Series::new("family_history_cancer".into(), flags(records, |r| r.family_history_cancer)).into(),
            Series::new("diabetes".into(), flags(records, |r| r.diabetes)).into(),
        ])?;

        Ok(df)
    }
}
