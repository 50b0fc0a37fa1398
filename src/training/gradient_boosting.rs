//! Gradient boosting with squared-error loss
//!
//! Each round fits a shallow regression tree to the current residuals and
//! adds a shrunken copy of it to the ensemble.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::decision_tree::{DecisionTreeConfig, DecisionTreeRegressor};
use super::models::{check_prediction_width, check_training_data, Regressor};
use crate::error::{Result, ScorecastError};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Row subsample ratio for each tree
    pub subsample: f64,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: 42,
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTreeRegressor>,
    initial_prediction: f64,
    n_features: usize,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.config.n_estimators = n;
        self
    }

    pub fn with_subsample(mut self, subsample: f64) -> Self {
        self.config.subsample = subsample;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn tree_config(&self) -> DecisionTreeConfig {
        DecisionTreeConfig {
            max_depth: Some(self.config.max_depth),
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: None,
            random_state: self.config.random_state,
        }
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let sample_size = (((n as f64) * self.config.subsample).ceil() as usize).clamp(1, n);
        let mut indices = rand::seq::index::sample(rng, n, sample_size).into_vec();
        indices.sort_unstable();
        indices
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if !(self.config.subsample > 0.0 && self.config.subsample <= 1.0) {
            return Err(ScorecastError::InvalidParameter {
                name: "subsample".to_string(),
                value: self.config.subsample.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        if self.config.n_estimators == 0 || self.config.max_depth == 0 {
            return Err(ScorecastError::InvalidParameter {
                name: "n_estimators/max_depth".to_string(),
                value: format!("{}/{}", self.config.n_estimators, self.config.max_depth),
                reason: "must both be at least 1".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.initial_prediction = y.mean().unwrap_or(0.0);
        self.trees.clear();

        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let lr = self.config.learning_rate;

        for _ in 0..self.config.n_estimators {
            let residuals: Array1<f64> = y - &predictions;

            let mut tree = DecisionTreeRegressor::new(self.tree_config());
            if self.config.subsample < 1.0 {
                let sample_indices = self.subsample_indices(n_samples, &mut rng);
                let x_sub = x.select(Axis(0), &sample_indices);
                let r_sub = residuals.select(Axis(0), &sample_indices);
                tree.fit(&x_sub, &r_sub)?;
            } else {
                tree.fit(x, &residuals)?;
            }

            for (i, row) in x.outer_iter().enumerate() {
                predictions[i] += lr * tree.predict_row(row);
            }
            self.trees.push(tree);
        }

        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ScorecastError::ModelNotFitted);
        }
        check_prediction_width(self.n_features, x)?;

        let lr = self.config.learning_rate;
        let predictions: Vec<f64> = x
            .outer_iter()
            .into_par_iter()
            .map(|row| {
                self.initial_prediction + self.trees.iter().map(|t| lr * t.predict_row(row)).sum::<f64>()
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn n_features(&self) -> Option<usize> {
        self.is_fitted().then_some(self.n_features)
    }
}
