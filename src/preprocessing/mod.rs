//! Data preprocessing module
//!
//! Turns patient-record frames into the dense feature matrix the risk
//! network consumes:
//! - Standard scaling of the numeric columns
//! - One-hot encoding (reference category dropped) of the categoricals
//! - Binary indicators passed through as 0.0 / 1.0

mod encoder;
mod pipeline;
mod scaler;

pub use encoder::{CategoryMapping, OneHotEncoder};
pub use pipeline::FeaturePreprocessor;
pub use scaler::{ScalerParams, StandardScaler};
