//! AdaBoost.R2 regression
//!
//! Each round draws a weighted bootstrap sample, fits a shallow regression
//! tree, and raises the weight of samples with large relative error.
//! Predictions are the weighted median of the estimators' outputs.

use super::decision_tree::{DecisionTreeConfig, DecisionTreeRegressor};
use super::models::{check_prediction_width, check_training_data, Regressor};
use crate::error::{Result, ScorecastError};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Loss used to turn absolute errors into per-sample losses in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaBoostLoss {
    #[default]
    Linear,
    Square,
    Exponential,
}

impl AdaBoostLoss {
    fn apply(&self, normalized_error: f64) -> f64 {
        match self {
            AdaBoostLoss::Linear => normalized_error,
            AdaBoostLoss::Square => normalized_error * normalized_error,
            AdaBoostLoss::Exponential => 1.0 - (-normalized_error).exp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of each base tree
    pub max_depth: usize,
    pub loss: AdaBoostLoss,
    pub random_state: u64,
}

impl Default for AdaBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            learning_rate: 1.0,
            max_depth: 3,
            loss: AdaBoostLoss::Linear,
            random_state: 42,
        }
    }
}

/// AdaBoost.R2 regressor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    config: AdaBoostConfig,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl AdaBoostRegressor {
    pub fn new(config: AdaBoostConfig) -> Self {
        Self {
            config,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.config.n_estimators = n;
        self
    }

    pub fn with_loss(mut self, loss: AdaBoostLoss) -> Self {
        self.config.loss = loss;
        self
    }

    pub fn n_estimators_fitted(&self) -> usize {
        self.estimators.len()
    }

    pub fn estimator_weights(&self) -> &[f64] {
        &self.estimator_weights
    }

    fn weighted_median_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut preds: Vec<(f64, f64)> = self
            .estimators
            .iter()
            .zip(self.estimator_weights.iter())
            .map(|(tree, &w)| (tree.predict_row(row), w))
            .collect();
        weighted_median(&mut preds)
    }
}

/// Lower weighted median: first value whose cumulative weight reaches half the total
fn weighted_median(values: &mut [(f64, f64)]) -> f64 {
    values.sort_by(|a, b| a.0.total_cmp(&b.0));
    let total: f64 = values.iter().map(|(_, w)| w).sum();
    let half = 0.5 * total;

    let mut cumulative = 0.0;
    for &(value, weight) in values.iter() {
        cumulative += weight;
        if cumulative >= half {
            return value;
        }
    }
    values.last().map_or(0.0, |(v, _)| *v)
}

/// Draw `n` indices with replacement, proportional to `weights` (which sum to 1)
fn weighted_bootstrap(rng: &mut Xoshiro256PlusPlus, weights: &[f64]) -> Vec<usize> {
    let mut cdf = Vec::with_capacity(weights.len());
    let mut acc = 0.0;
    for w in weights {
        acc += w;
        cdf.push(acc);
    }
    let last = weights.len() - 1;

    (0..weights.len())
        .map(|_| {
            let u: f64 = rng.gen::<f64>() * acc;
            cdf.partition_point(|&c| c <= u).min(last)
        })
        .collect()
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.config.n_estimators == 0 || !(self.config.learning_rate > 0.0) {
            return Err(ScorecastError::InvalidParameter {
                name: "n_estimators/learning_rate".to_string(),
                value: format!("{}/{}", self.config.n_estimators, self.config.learning_rate),
                reason: "need at least one estimator and a positive learning rate".to_string(),
            });
        }

        let n = x.nrows();
        let lr = self.config.learning_rate;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut sample_weights = vec![1.0 / n as f64; n];

        self.estimators.clear();
        self.estimator_weights.clear();

        for round in 0..self.config.n_estimators {
            let sample = weighted_bootstrap(&mut rng, &sample_weights);
            let x_boot = x.select(Axis(0), &sample);
            let y_boot = y.select(Axis(0), &sample);

            let mut tree = DecisionTreeRegressor::new(DecisionTreeConfig {
                max_depth: Some(self.config.max_depth),
                random_state: rng.gen(),
                ..Default::default()
            });
            tree.fit(&x_boot, &y_boot)?;

            let abs_errors: Vec<f64> = x
                .outer_iter()
                .zip(y.iter())
                .map(|(row, &target)| (tree.predict_row(row) - target).abs())
                .collect();
            let max_error = abs_errors.iter().cloned().fold(0.0, f64::max);

            if max_error == 0.0 {
                // Perfect fit ends boosting with full weight on this tree
                self.estimators.push(tree);
                self.estimator_weights.push(1.0);
                break;
            }

            let losses: Vec<f64> = abs_errors
                .iter()
                .map(|e| self.config.loss.apply(e / max_error))
                .collect();
            let estimator_error: f64 = losses.iter().zip(sample_weights.iter()).map(|(l, w)| l * w).sum();

            if estimator_error <= 0.0 {
                self.estimators.push(tree);
                self.estimator_weights.push(1.0);
                break;
            }

            if estimator_error >= 0.5 {
                debug!(round, estimator_error, "AdaBoost stopping: weak learner too inaccurate");
                // Keep the first learner so the ensemble is never empty
                if self.estimators.is_empty() {
                    self.estimators.push(tree);
                    self.estimator_weights.push(1.0);
                }
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            let estimator_weight = lr * (1.0 / beta).ln();

            for (w, loss) in sample_weights.iter_mut().zip(losses.iter()) {
                *w *= beta.powf((1.0 - loss) * lr);
            }
            let total: f64 = sample_weights.iter().sum();
            if !(total > 0.0) || !total.is_finite() {
                self.estimators.push(tree);
                self.estimator_weights.push(estimator_weight);
                break;
            }
            sample_weights.iter_mut().for_each(|w| *w /= total);

            self.estimators.push(tree);
            self.estimator_weights.push(estimator_weight);
        }

        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(ScorecastError::ModelNotFitted);
        }
        check_prediction_width(self.n_features, x)?;

        let predictions: Vec<f64> = x
            .outer_iter()
            .into_par_iter()
            .map(|row| self.weighted_median_row(row))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn is_fitted(&self) -> bool {
        !self.estimators.is_empty()
    }

    fn n_features(&self) -> Option<usize> {
        self.is_fitted().then_some(self.n_features)
    }
}
