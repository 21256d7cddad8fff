//! L2-regularised logistic regression trained with full-batch gradient descent

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// `LogisticRegression` block of params.yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionParams {
    /// Inverse regularisation strength
    #[serde(rename = "C")]
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub tol: f64,
}

impl Default for LogisticRegressionParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            learning_rate: 0.1,
            tol: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    params: LogisticRegressionParams,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
}

impl LogisticRegression {
    pub fn new(params: LogisticRegressionParams) -> Self {
        Self {
            params,
            coefficients: None,
            intercept: 0.0,
            n_iter: 0,
        }
    }

    pub fn params(&self) -> &LogisticRegressionParams {
        &self.params
    }

    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    /// Gradient descent on mean log-loss plus `||w||² / (2 C n)`; the
    /// intercept is not penalised
    pub fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::Training("logistic regression needs at least one row".to_string()));
        }
        if self.params.c <= 0.0 {
            return Err(PipelineError::Config(format!("C must be positive, got {}", self.params.c)));
        }

        let y = Array1::from(y.to_vec());
        let n = n_samples as f64;
        let penalty = 1.0 / (self.params.c * n);
        let lr = self.params.learning_rate;

        let mut weights = Array1::<f64>::zeros(n_features);
        let mut bias = 0.0;
        self.n_iter = 0;

        for _ in 0..self.params.max_iter {
            self.n_iter += 1;
            let predictions = Self::sigmoid(&(x.dot(&weights) + bias));
            let errors = &predictions - &y;

            let dw = x.t().dot(&errors) / n + &weights * penalty;
            let db = errors.sum() / n;

            let max_grad = dw.iter().fold(db.abs(), |acc, g| acc.max(g.abs()));
            if max_grad < self.params.tol {
                break;
            }

            weights.scaled_add(-lr, &dw);
            bias -= lr * db;
        }

        self.coefficients = Some(weights);
        self.intercept = bias;
        Ok(())
    }

    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + self.intercept)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(Self::sigmoid(&self.decision_function(x)?))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Iterations run by the last `fit`
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}
