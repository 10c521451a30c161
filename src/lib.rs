//! Liver risk - liver-cancer risk estimation
//!
//! This crate provides the full pipeline from raw patient data to a served
//! risk score:
//! - SQL-script data loading with a deterministic synthetic fallback
//! - Standardization and one-hot encoding of patient features
//! - A small MLP with dropout trained by Adam on binary cross-entropy
//! - Versioned artifact storage
//! - An HTTP prediction API and a CLI
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - Patient schema, SQL loader, synthetic generator
//! - [`preprocessing`] - Scaling and encoding into the model's input vector
//!
//! ## Model
//! - [`model`] - Risk network and optimizer
//! - [`training`] - Training loop, split and metrics
//! - [`registry`] - Artifact persistence
//! - [`inference`] - Per-request prediction and clinical messages
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod data;
pub mod preprocessing;

// Model
pub mod model;
pub mod training;
pub mod registry;
pub mod inference;

// Services
pub mod server;
pub mod cli;

pub use error::{Result, RiskError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, RiskError};

    // Data
    pub use crate::data::{
        create_synthetic_data, load_data_from_sql, render_sql_script, DataSource, LoadedDataset,
        PatientRecord, SyntheticConfig,
    };

    // Preprocessing
    pub use crate::preprocessing::{FeaturePreprocessor, OneHotEncoder, StandardScaler};

    // Model
    pub use crate::model::{Adam, ModelWeights, NetworkConfig, RiskNetwork};

    // Training
    pub use crate::training::{TrainedArtifacts, Trainer, TrainingConfig, TrainingReport};

    // Artifacts
    pub use crate::registry::{ArtifactManifest, FsModelRegistry, MemoryModelRegistry, ModelRegistry};

    // Inference
    pub use crate::inference::{Predictor, RiskAssessment, RiskScorer};

    // Server
    pub use crate::server::{create_router, AppState, ServerConfig};
}
