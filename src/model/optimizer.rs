//! Adam optimizer

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::network::{LayerGradient, RiskNetwork};
use crate::error::{Result, RiskError};

/// Adam hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

#[derive(Debug, Clone)]
struct Moments {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

/// Adam with bias-corrected first and second moments
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    step: i32,
    moments: Vec<Moments>,
}

impl Adam {
    pub fn new(config: AdamConfig) -> Self {
        Self {
            config,
            step: 0,
            moments: Vec::new(),
        }
    }

    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self::new(AdamConfig {
            learning_rate,
            ..AdamConfig::default()
        })
    }

    pub fn steps_taken(&self) -> i32 {
        self.step
    }

    /// Apply one update to every layer of `network`
    pub fn step(&mut self, network: &mut RiskNetwork, gradients: &[LayerGradient]) -> Result<()> {
        let layers = network.layers_mut();
        if gradients.len() != layers.len() {
            return Err(RiskError::ShapeError {
                expected: format!("{} layer gradients", layers.len()),
                actual: gradients.len().to_string(),
            });
        }

        if self.moments.is_empty() {
            self.moments = layers
                .iter()
                .map(|l| Moments {
                    m_w: Array2::zeros(l.weights.raw_dim()),
                    v_w: Array2::zeros(l.weights.raw_dim()),
                    m_b: Array1::zeros(l.bias.len()),
                    v_b: Array1::zeros(l.bias.len()),
                })
                .collect();
        }

        self.step += 1;
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let bias1 = 1.0 - beta1.powi(self.step);
        let bias2 = 1.0 - beta2.powi(self.step);

        for ((layer, grad), m) in layers.iter_mut().zip(gradients).zip(self.moments.iter_mut()) {
            if grad.weights.dim() != layer.weights.dim() {
                return Err(RiskError::ShapeError {
                    expected: format!("{:?}", layer.weights.dim()),
                    actual: format!("{:?}", grad.weights.dim()),
                });
            }

            m.m_w = &m.m_w * beta1 + &grad.weights * (1.0 - beta1);
            m.v_w = &m.v_w * beta2 + &grad.weights.mapv(|g| g * g) * (1.0 - beta2);
            m.m_b = &m.m_b * beta1 + &grad.bias * (1.0 - beta1);
            m.v_b = &m.v_b * beta2 + &grad.bias.mapv(|g| g * g) * (1.0 - beta2);

            ndarray::Zip::from(&mut layer.weights)
                .and(&m.m_w)
                .and(&m.v_w)
                .for_each(|w, &mw, &vw| {
                    *w -= learning_rate * (mw / bias1) / ((vw / bias2).sqrt() + epsilon);
                });
            ndarray::Zip::from(&mut layer.bias)
                .and(&m.m_b)
                .and(&m.v_b)
                .for_each(|b, &mb, &vb| {
                    *b -= learning_rate * (mb / bias1) / ((vb / bias2).sqrt() + epsilon);
                });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NetworkConfig;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut net = RiskNetwork::new(2, NetworkConfig::default().with_hidden_layers(vec![3])).unwrap();
        let before = net.weights();

        let grads: Vec<LayerGradient> = before
            .layers
            .iter()
            .map(|l| LayerGradient {
                weights: Array2::from_elem(l.weights.raw_dim(), 0.5),
                bias: Array1::from_elem(l.bias.len(), -2.0),
            })
            .collect();

        let mut adam = Adam::with_learning_rate(0.01);
        adam.step(&mut net, &grads).unwrap();
        let after = net.weights();

        // Bias-corrected first step is lr * sign(g)
        for (b, a) in before.layers.iter().zip(after.layers.iter()) {
            for (w0, w1) in b.weights.iter().zip(a.weights.iter()) {
                assert!((w0 - w1 - 0.01).abs() < 1e-6);
            }
            for (b0, b1) in b.bias.iter().zip(a.bias.iter()) {
                assert!((b1 - b0 - 0.01).abs() < 1e-6);
            }
        }
        assert_eq!(adam.steps_taken(), 1);
    }

    #[test]
    fn test_gradient_count_checked() {
        let mut net = RiskNetwork::new(2, NetworkConfig::default()).unwrap();
        let mut adam = Adam::new(AdamConfig::default());
        assert!(adam.step(&mut net, &[]).is_err());
    }

    #[test]
    fn test_training_steps_reduce_loss() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]];
        let y = array![1.0, 0.0, 1.0, 0.0];
        let mut net = RiskNetwork::new(2, NetworkConfig::default().with_dropout(0.0)).unwrap();
        let mut adam = Adam::with_learning_rate(0.01);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);

        let loss = |p: &Array1<f64>| -> f64 {
            p.iter()
                .zip(y.iter())
                .map(|(&p, &y)| -(y * p.ln() + (1.0 - y) * (1.0 - p).ln()))
                .sum::<f64>()
                / 4.0
        };

        let initial = loss(&net.predict_proba(&x).unwrap());
        for _ in 0..200 {
            let pass = net.forward_train(&x, &mut rng).unwrap();
            let grads = net.backward(&pass, &y).unwrap();
            adam.step(&mut net, &grads).unwrap();
        }
        let trained = loss(&net.predict_proba(&x).unwrap());
        assert!(trained < initial * 0.5, "{} -> {}", initial, trained);
    }
}
