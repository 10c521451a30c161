//! Feedforward risk network
//!
//! `in -> [Linear, ReLU, Dropout]* -> Linear -> Sigmoid`, trained on mean
//! binary cross-entropy.

use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

/// Network shape and regularization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Hidden layer widths
    pub hidden_layers: Vec<usize>,
    /// Dropout probability after each hidden activation
    pub dropout: f64,
    /// Seed for weight initialization
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 32],
            dropout: 0.3,
            seed: 42,
        }
    }
}

impl NetworkConfig {
    pub fn with_hidden_layers(mut self, layers: Vec<usize>) -> Self {
        self.hidden_layers = layers;
        self
    }

    pub fn with_dropout(mut self, p: f64) -> Self {
        self.dropout = p;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(RiskError::InvalidParameter {
                name: "dropout".to_string(),
                value: self.dropout.to_string(),
                reason: "must be in [0, 1)".to_string(),
            });
        }
        if self.hidden_layers.iter().any(|&w| w == 0) {
            return Err(RiskError::InvalidParameter {
                name: "hidden_layers".to_string(),
                value: format!("{:?}", self.hidden_layers),
                reason: "layer widths must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// One affine layer, weights stored `(n_in, n_out)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

impl DenseLayer {
    fn glorot(n_in: usize, n_out: usize, rng: &mut Xoshiro256PlusPlus) -> Self {
        let limit = (6.0 / (n_in + n_out) as f64).sqrt();
        let weights = Array2::from_shape_fn((n_in, n_out), |_| rng.gen::<f64>() * 2.0 * limit - limit);
        Self {
            weights,
            bias: Array1::zeros(n_out),
        }
    }

    pub fn n_in(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_out(&self) -> usize {
        self.weights.ncols()
    }
}

/// Everything needed to rebuild a trained network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub input_dim: usize,
    pub layers: Vec<DenseLayer>,
}

impl ModelWeights {
    /// Check that layers chain from `input_dim` down to a single output
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(RiskError::ShapeError {
                expected: "at least one layer".to_string(),
                actual: "0 layers".to_string(),
            });
        }

        let mut width = self.input_dim;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.n_in() != width {
                return Err(RiskError::ShapeError {
                    expected: format!("layer {} input width {}", i, width),
                    actual: layer.n_in().to_string(),
                });
            }
            if layer.bias.len() != layer.n_out() {
                return Err(RiskError::ShapeError {
                    expected: format!("layer {} bias length {}", i, layer.n_out()),
                    actual: layer.bias.len().to_string(),
                });
            }
            width = layer.n_out();
        }

        if width != 1 {
            return Err(RiskError::ShapeError {
                expected: "output width 1".to_string(),
                actual: width.to_string(),
            });
        }
        Ok(())
    }

    pub fn n_parameters(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.bias.len())
            .sum()
    }
}

/// Gradient of the loss for one layer
#[derive(Debug, Clone)]
pub struct LayerGradient {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

/// Intermediate values of a training forward pass
#[derive(Debug, Clone)]
pub struct ForwardPass {
    /// Layer inputs; `activations[0]` is the batch itself
    activations: Vec<Array2<f64>>,
    /// Pre-activations per layer
    z_values: Vec<Array2<f64>>,
    /// Scaled dropout masks per hidden layer
    masks: Vec<Array2<f64>>,
    /// Sigmoid outputs
    probabilities: Array1<f64>,
}

impl ForwardPass {
    pub fn probabilities(&self) -> &Array1<f64> {
        &self.probabilities
    }
}

/// Binary risk classifier
#[derive(Debug, Clone)]
pub struct RiskNetwork {
    config: NetworkConfig,
    input_dim: usize,
    layers: Vec<DenseLayer>,
}

impl RiskNetwork {
    /// Build a freshly initialized network
    pub fn new(input_dim: usize, config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        if input_dim == 0 {
            return Err(RiskError::InvalidParameter {
                name: "input_dim".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
        let mut sizes = vec![input_dim];
        sizes.extend(&config.hidden_layers);
        sizes.push(1);

        let layers = sizes
            .windows(2)
            .map(|w| DenseLayer::glorot(w[0], w[1], &mut rng))
            .collect();

        Ok(Self {
            config,
            input_dim,
            layers,
        })
    }

    /// Rebuild a network from saved weights, in eval configuration
    pub fn from_weights(weights: ModelWeights) -> Result<Self> {
        weights.validate()?;
        let hidden_layers = weights.layers[..weights.layers.len() - 1]
            .iter()
            .map(DenseLayer::n_out)
            .collect();

        Ok(Self {
            config: NetworkConfig::default().with_hidden_layers(hidden_layers),
            input_dim: weights.input_dim,
            layers: weights.layers,
        })
    }

    pub fn weights(&self) -> ModelWeights {
        ModelWeights {
            input_dim: self.input_dim,
            layers: self.layers.clone(),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.input_dim {
            return Err(RiskError::ShapeError {
                expected: format!("{} input features", self.input_dim),
                actual: x.ncols().to_string(),
            });
        }
        Ok(())
    }

    /// Training-mode forward pass with inverted dropout
    pub fn forward_train<R: Rng>(&self, x: &Array2<f64>, rng: &mut R) -> Result<ForwardPass> {
        self.check_input(x)?;

        let p = self.config.dropout;
        let keep_scale = 1.0 / (1.0 - p);
        let last = self.layers.len() - 1;

        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(self.layers.len());
        let mut masks = Vec::with_capacity(last);
        let mut probabilities = Array1::zeros(x.nrows());

        for (i, layer) in self.layers.iter().enumerate() {
            let input = &activations[activations.len() - 1];
            let z = input.dot(&layer.weights) + &layer.bias;

            if i < last {
                let mask = Array2::from_shape_fn(z.raw_dim(), |_| {
                    if p == 0.0 || rng.gen::<f64>() >= p {
                        keep_scale
                    } else {
                        0.0
                    }
                });
                let a = z.mapv(relu) * &mask;
                masks.push(mask);
                z_values.push(z);
                activations.push(a);
            } else {
                probabilities = z.column(0).mapv(sigmoid);
                z_values.push(z);
            }
        }

        Ok(ForwardPass {
            activations,
            z_values,
            masks,
            probabilities,
        })
    }

    /// Eval-mode probabilities, one per row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_input(x)?;

        let last = self.layers.len() - 1;
        let mut a = x.to_owned();
        for layer in &self.layers[..last] {
            a = (a.dot(&layer.weights) + &layer.bias).mapv(relu);
        }
        let out = a.dot(&self.layers[last].weights) + &self.layers[last].bias;
        Ok(out.column(0).mapv(sigmoid))
    }

    /// Gradients of mean BCE for the batch that produced `pass`
    pub fn backward(&self, pass: &ForwardPass, y: &Array1<f64>) -> Result<Vec<LayerGradient>> {
        let n = y.len();
        if n != pass.probabilities.len() {
            return Err(RiskError::ShapeError {
                expected: format!("{} labels", pass.probabilities.len()),
                actual: n.to_string(),
            });
        }

        // sigmoid + BCE collapses to (p - y) / n at the output
        let mut delta = ((&pass.probabilities - y) / n as f64).insert_axis(Axis(1));
        let mut gradients = Vec::with_capacity(self.layers.len());

        for i in (0..self.layers.len()).rev() {
            let a_prev = &pass.activations[i];
            gradients.push(LayerGradient {
                weights: a_prev.t().dot(&delta),
                bias: delta.sum_axis(Axis(0)),
            });

            if i > 0 {
                let relu_grad = pass.z_values[i - 1].mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                delta = delta.dot(&self.layers[i].weights.t()) * &pass.masks[i - 1] * relu_grad;
            }
        }

        gradients.reverse();
        Ok(gradients)
    }
}

fn relu(v: f64) -> f64 {
    v.max(0.0)
}

/// Numerically stable logistic function
pub fn sigmoid(v: f64) -> f64 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}
