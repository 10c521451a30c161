//! Deterministic synthetic patient dataset
//!
//! Used whenever the SQL script cannot be materialized. Each column is drawn
//! independently, so the label carries no signal; the point is a dataset with
//! the right shape that trains end to end and is identical across runs.

use crate::error::{Result, RiskError};
use polars::prelude::*;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

pub const GENDERS: [&str; 2] = ["Male", "Female"];
pub const ALCOHOL_LEVELS: [&str; 4] = ["None", "Light", "Moderate", "Heavy"];
pub const SMOKING_STATUSES: [&str; 3] = ["Never", "Former", "Current"];
pub const ACTIVITY_LEVELS: [&str; 3] = ["Low", "Moderate", "High"];

/// Synthetic generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Number of rows to generate
    pub n_samples: usize,
    /// Seed for the generator
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_samples: 1000,
            seed: 42,
        }
    }
}

impl SyntheticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Generate the default synthetic dataset (1000 rows, seed 42)
pub fn create_synthetic_data() -> Result<DataFrame> {
    generate(&SyntheticConfig::default())
}

/// Generate a synthetic dataset with the canonical schema
pub fn generate(config: &SyntheticConfig) -> Result<DataFrame> {
    if config.n_samples == 0 {
        return Err(RiskError::InvalidParameter {
            name: "n_samples".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let n = config.n_samples;
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);

    let age: Vec<f64> = (0..n).map(|_| rng.gen_range(30..80) as f64).collect();
    let gender = choose(&mut rng, &GENDERS, n);
    let bmi: Vec<f64> = (0..n).map(|_| normal(&mut rng, 25.0, 5.0)).collect();
    let alcohol = choose(&mut rng, &ALCOHOL_LEVELS, n);
    let smoking = choose(&mut rng, &SMOKING_STATUSES, n);
    let activity = choose(&mut rng, &ACTIVITY_LEVELS, n);
    let liver_score: Vec<f64> = (0..n).map(|_| normal(&mut rng, 50.0, 15.0)).collect();
    let afp: Vec<f64> = (0..n).map(|_| exponential(&mut rng, 10.0)).collect();
    let hepatitis_b = bernoulli(&mut rng, 0.10, n);
    let hepatitis_c = bernoulli(&mut rng, 0.05, n);
    let cirrhosis = bernoulli(&mut rng, 0.15, n);
    let family_history = bernoulli(&mut rng, 0.30, n);
    let diabetes = bernoulli(&mut rng, 0.20, n);
    let label = bernoulli(&mut rng, 0.15, n);

    let df = DataFrame::new(vec![
        Series::new("age".into(), age).into(),
        Series::new("bmi".into(), bmi).into(),
        Series::new("liver_function_score".into(), liver_score).into(),
        Series::new("alpha_fetoprotein_level".into(), afp).into(),
        Series::new("gender".into(), gender).into(),
        Series::new("alcohol_consumption".into(), alcohol).into(),
        Series::new("smoking_status".into(), smoking).into(),
        Series::new("physical_activity_level".into(), activity).into(),
        Series::new("hepatitis_b".into(), hepatitis_b).into(),
        Series::new("hepatitis_c".into(), hepatitis_c).into(),
        Series::new("cirrhosis_history".into(), cirrhosis).into(),
        Series::new("family_history_cancer".into(), family_history).into(),
        Series::new("diabetes".into(), diabetes).into(),
        Series::new(super::TARGET.into(), label).into(),
    ])?;

    Ok(df)
}

fn choose(rng: &mut Xoshiro256PlusPlus, options: &[&str], n: usize) -> Vec<String> {
    (0..n)
        .map(|_| options[rng.gen_range(0..options.len())].to_string())
        .collect()
}

fn bernoulli(rng: &mut Xoshiro256PlusPlus, p: f64, n: usize) -> Vec<i64> {
    (0..n).map(|_| i64::from(rng.gen::<f64>() < p)).collect()
}

/// Box-Muller draw from N(mean, std^2)
fn normal(rng: &mut Xoshiro256PlusPlus, mean: f64, std: f64) -> f64 {
    // u1 in (0, 1] keeps ln finite
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std * z
}

/// Inverse-CDF draw from an exponential with the given mean
fn exponential(rng: &mut Xoshiro256PlusPlus, mean: f64) -> f64 {
    let u = 1.0 - rng.gen::<f64>();
    -mean * u.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{feature_columns, TARGET};

    #[test]
    fn test_default_shape() {
        let df = create_synthetic_data().unwrap();
        assert_eq!(df.height(), 1000);
        assert_eq!(df.width(), 14);

        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let mut expected: Vec<&str> = feature_columns();
        expected.push(TARGET);
        assert_eq!(names, expected);
    }

    #[test]
    fn test_deterministic() {
        let a = create_synthetic_data().unwrap();
        let b = create_synthetic_data().unwrap();
        assert!(a.equals(&b));
    }

    #[test]
    fn test_seed_changes_output() {
        let a = generate(&SyntheticConfig::new().with_samples(50)).unwrap();
        let b = generate(&SyntheticConfig::new().with_samples(50).with_seed(7)).unwrap();
        assert!(!a.equals(&b));
    }

    #[test]
    fn test_value_ranges() {
        let df = create_synthetic_data().unwrap();

        let ages = df.column("age").unwrap().as_materialized_series().f64().unwrap().clone();
        assert!(ages.into_no_null_iter().all(|a| (30.0..=79.0).contains(&a) && a.fract() == 0.0));

        let afp = df
            .column("alpha_fetoprotein_level")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .clone();
        assert!(afp.into_no_null_iter().all(|v| v >= 0.0));

        let genders = df.column("gender").unwrap().as_materialized_series().str().unwrap().clone();
        assert!(genders.into_no_null_iter().all(|g| GENDERS.contains(&g)));
    }

    #[test]
    fn test_label_prevalence_is_plausible() {
        let df = create_synthetic_data().unwrap();
        let labels = df.column(TARGET).unwrap().as_materialized_series().i64().unwrap().clone();
        let positives: i64 = labels.into_no_null_iter().sum();
        // Bernoulli(0.15) over 1000 rows
        assert!((80..=220).contains(&positives), "positives = {}", positives);
    }

    #[test]
    fn test_bmi_moments() {
        let df = create_synthetic_data().unwrap();
        let bmi = df.column("bmi").unwrap().as_materialized_series().f64().unwrap().clone();
        let mean = bmi.mean().unwrap();
        let std = bmi.std(0).unwrap();
        assert!((mean - 25.0).abs() < 1.0, "mean = {}", mean);
        assert!((std - 5.0).abs() < 1.0, "std = {}", std);
    }

    #[test]
    fn test_zero_samples_rejected() {
        let err = generate(&SyntheticConfig::new().with_samples(0)).unwrap_err();
        assert!(matches!(err, RiskError::InvalidParameter { .. }));
    }
}
