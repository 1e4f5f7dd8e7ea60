//! Logistic regression over an ordered feature row.

use serde::{Deserialize, Serialize};

use super::dense::sigmoid;
use crate::error::{EdgeError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    /// One coefficient per feature, in the artifact's feature order
    pub coefficients: Vec<f64>,
}

impl LogisticModel {
    pub fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.coefficients.len() != n_features {
            return Err(format!(
                "{} coefficients for {} features",
                self.coefficients.len(),
                n_features
            ));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err("non-finite coefficient".to_string());
        }
        Ok(())
    }

    pub fn logit(&self, input: &[f64]) -> Result<f64> {
        if input.len() != self.coefficients.len() {
            return Err(EdgeError::Validation(format!(
                "logistic input has {} values, expected {}",
                input.len(),
                self.coefficients.len()
            )));
        }
        Ok(self
            .coefficients
            .iter()
            .zip(input)
            .fold(self.intercept, |acc, (c, x)| acc + c * x))
    }

    pub fn predict_proba(&self, input: &[f64]) -> Result<f64> {
        Ok(sigmoid(self.logit(input)?))
    }
}
