//! Small feed-forward networks evaluated on the CPU.
//!
//! Weights come from a JSON artifact. Shapes are checked once at load time so
//! inference only has to check the input length.

use serde::{Deserialize, Serialize};

use crate::error::{EdgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => sigmoid(x),
        }
    }
}

/// Logistic function, stable for large |x|
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Row-major, one row per output unit
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    fn units(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let z = row.iter().zip(x).fold(*b, |acc, (w, v)| acc + w * v);
                self.activation.apply(z)
            })
            .collect()
    }
}

/// Binary classifier network: the last layer must have one unit whose output
/// is read as P(class = 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub input_dim: usize,
    /// Optional z-score scaling applied before the first layer
    #[serde(default)]
    pub input_mean: Option<Vec<f64>>,
    #[serde(default)]
    pub input_std: Option<Vec<f64>>,
    pub layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.input_dim == 0 {
            return Err("input_dim must be > 0".to_string());
        }
        if self.layers.is_empty() {
            return Err("network has no layers".to_string());
        }
        match (&self.input_mean, &self.input_std) {
            (Some(mean), Some(std)) => {
                if mean.len() != self.input_dim || std.len() != self.input_dim {
                    return Err(format!(
                        "scaler length {}/{} does not match input_dim {}",
                        mean.len(),
                        std.len(),
                        self.input_dim
                    ));
                }
                if std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
                    return Err("input_std must be finite and > 0".to_string());
                }
            }
            (None, None) => {}
            _ => return Err("input_mean and input_std go together".to_string()),
        }

        let mut fan_in = self.input_dim;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.units() == 0 || layer.bias.len() != layer.units() {
                return Err(format!(
                    "layer {i}: {} weight rows, {} biases",
                    layer.units(),
                    layer.bias.len()
                ));
            }
            if layer.weights.iter().any(|row| row.len() != fan_in) {
                return Err(format!("layer {i}: expected rows of length {fan_in}"));
            }
            let finite = layer.weights.iter().flatten().chain(&layer.bias).all(|v| v.is_finite());
            if !finite {
                return Err(format!("layer {i}: non-finite parameter"));
            }
            fan_in = layer.units();
        }
        if fan_in != 1 {
            return Err(format!("output layer has {fan_in} units, expected 1"));
        }
        Ok(())
    }

    /// P(class = 1) for one input row
    pub fn predict_proba(&self, input: &[f64]) -> Result<f64> {
        if input.len() != self.input_dim {
            return Err(EdgeError::Validation(format!(
                "dense input has {} values, expected {}",
                input.len(),
                self.input_dim
            )));
        }

        let mut x: Vec<f64> = match (&self.input_mean, &self.input_std) {
            (Some(mean), Some(std)) => input
                .iter()
                .zip(mean.iter().zip(std))
                .map(|(v, (m, s))| (v - m) / s.max(1e-12))
                .collect(),
            _ => input.to_vec(),
        };
        for layer in &self.layers {
            x = layer.forward(&x);
        }

        match x.as_slice() {
            [p] if p.is_finite() => Ok(p.clamp(0.0, 1.0)),
            [p] => Err(EdgeError::NumericInconsistency(format!(
                "dense output is not finite: {p}"
            ))),
            _ => Err(EdgeError::Validation(format!(
                "dense output has {} values, expected 1",
                x.len()
            ))),
        }
    }
}
