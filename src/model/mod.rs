//! Risk model: a small MLP with a sigmoid head and its optimizer

mod network;
mod optimizer;

pub use network::{sigmoid, DenseLayer, ForwardPass, LayerGradient, ModelWeights, NetworkConfig, RiskNetwork};
pub use optimizer::{Adam, AdamConfig};
