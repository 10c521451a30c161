//! Seeded train/validation split

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Result, RiskError};

/// Row indices of the two partitions
#[derive(Debug, Clone, PartialEq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffle `0..n` and hold out `ceil(n * validation_split)` rows
pub fn train_val_split<R: Rng>(n: usize, validation_split: f64, rng: &mut R) -> Result<SplitIndices> {
    if !(0.0..1.0).contains(&validation_split) {
        return Err(RiskError::InvalidParameter {
            name: "validation_split".to_string(),
            value: validation_split.to_string(),
            reason: "must be in [0, 1)".to_string(),
        });
    }

    let n_val = (n as f64 * validation_split).ceil() as usize;
    if n_val >= n {
        return Err(RiskError::TrainingError(format!(
            "{} rows leave nothing to train on with validation_split {}",
            n, validation_split
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let train = indices.split_off(n_val);

    Ok(SplitIndices {
        train,
        validation: indices,
    })
}
