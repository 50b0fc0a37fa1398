//! CatBoost-style gradient boosting on symmetric trees
//!
//! - Symmetric (oblivious) decision trees: every node at one depth shares the same split
//! - Features are quantized once into border bins; splits are scored from
//!   per-leaf gradient histograms
//! - Bayesian bootstrap: each round reweights samples by `(-ln U)^temperature`

use super::models::{check_prediction_width, check_training_data, Regressor};
use crate::error::{Result, ScorecastError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of every symmetric tree
    pub max_depth: usize,
    /// L2 regularization on leaf values
    pub reg_lambda: f64,
    /// Maximum number of split borders per feature
    pub border_count: usize,
    /// Bayesian bootstrap temperature, 0 disables reweighting
    pub bagging_temperature: f64,
    pub random_state: u64,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            reg_lambda: 3.0,
            border_count: 254,
            bagging_temperature: 1.0,
            random_state: 42,
        }
    }
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    /// (feature, threshold) per level
    splits: Vec<(usize, f64)>,
    /// 2^depth leaf values
    leaf_values: Vec<f64>,
}

impl SymmetricTree {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut idx = 0usize;
        for &(feature, threshold) in &self.splits {
            idx = idx * 2 + usize::from(sample[feature] > threshold);
        }
        self.leaf_values[idx]
    }
}

/// Candidate split borders per feature, from training data only
fn compute_borders(x: &Array2<f64>, border_count: usize) -> Vec<Vec<f64>> {
    x.columns()
        .into_iter()
        .map(|col| {
            let mut values: Vec<f64> = col.to_vec();
            values.sort_by(|a, b| a.total_cmp(b));
            values.dedup();

            let midpoints: Vec<f64> = values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
            if midpoints.len() <= border_count {
                return midpoints;
            }

            // Evenly spaced quantiles of the distinct values
            let mut picked: Vec<f64> = (1..=border_count)
                .map(|k| midpoints[k * (midpoints.len() - 1) / border_count])
                .collect();
            picked.dedup();
            picked
        })
        .collect()
}

/// Bin index per (sample, feature): number of borders strictly below the value
fn quantize(x: &Array2<f64>, borders: &[Vec<f64>]) -> Array2<u16> {
    Array2::from_shape_fn(x.dim(), |(i, f)| {
        borders[f].partition_point(|&b| b < x[[i, f]]) as u16
    })
}

/// Best border for one feature given the current leaf assignment.
/// Returns (border index, gain).
fn best_border_for_feature(
    bins: ArrayView1<u16>,
    n_borders: usize,
    leaf_of: &[usize],
    n_leaves: usize,
    grad: &[f64],
    hess: &[f64],
    reg_lambda: f64,
) -> Option<(usize, f64)> {
    if n_borders == 0 {
        return None;
    }
    let n_bins = n_borders + 1;
    let mut g_hist = vec![0.0; n_leaves * n_bins];
    let mut h_hist = vec![0.0; n_leaves * n_bins];

    for (i, &leaf) in leaf_of.iter().enumerate() {
        let slot = leaf * n_bins + bins[i] as usize;
        g_hist[slot] += grad[i];
        h_hist[slot] += hess[i];
    }

    let score = |g: f64, h: f64| g * g / (h + reg_lambda);
    let mut gains = vec![0.0; n_borders];

    for leaf in 0..n_leaves {
        let row = leaf * n_bins..(leaf + 1) * n_bins;
        let g_total: f64 = g_hist[row.clone()].iter().sum();
        let h_total: f64 = h_hist[row.clone()].iter().sum();
        let parent = score(g_total, h_total);

        let (mut g_left, mut h_left) = (0.0, 0.0);
        for (border, gain) in gains.iter_mut().enumerate() {
            g_left += g_hist[row.start + border];
            h_left += h_hist[row.start + border];
            *gain += score(g_left, h_left) + score(g_total - g_left, h_total - h_left) - parent;
        }
    }

    gains
        .into_iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (border, gain)| match best {
            Some(b) if b.1 >= gain => Some(b),
            _ => Some((border, gain)),
        })
        .filter(|&(_, gain)| gain > 1e-12)
}

fn build_symmetric_tree(
    bins: &Array2<u16>,
    borders: &[Vec<f64>],
    grad: &[f64],
    hess: &[f64],
    max_depth: usize,
    reg_lambda: f64,
) -> SymmetricTree {
    let n_samples = bins.nrows();
    let mut splits = Vec::with_capacity(max_depth);
    let mut leaf_of = vec![0usize; n_samples];
    let mut n_leaves = 1usize;

    for _ in 0..max_depth {
        let candidates: Vec<Option<(usize, f64)>> = (0..borders.len())
            .into_par_iter()
            .map(|f| {
                best_border_for_feature(
                    bins.column(f),
                    borders[f].len(),
                    &leaf_of,
                    n_leaves,
                    grad,
                    hess,
                    reg_lambda,
                )
            })
            .collect();

        // Lowest feature index wins ties
        let best = candidates
            .into_iter()
            .enumerate()
            .filter_map(|(f, c)| c.map(|(border, gain)| (f, border, gain)))
            .fold(None, |acc: Option<(usize, usize, f64)>, cand| match acc {
                Some(b) if b.2 >= cand.2 => Some(b),
                _ => Some(cand),
            });

        let Some((feature, border, _)) = best else {
            break;
        };

        splits.push((feature, borders[feature][border]));
        for (i, leaf) in leaf_of.iter_mut().enumerate() {
            *leaf = *leaf * 2 + usize::from(bins[[i, feature]] as usize > border);
        }
        n_leaves *= 2;
    }

    let mut g_sum = vec![0.0; n_leaves];
    let mut h_sum = vec![0.0; n_leaves];
    for (i, &leaf) in leaf_of.iter().enumerate() {
        g_sum[leaf] += grad[i];
        h_sum[leaf] += hess[i];
    }
    let leaf_values = g_sum
        .iter()
        .zip(h_sum.iter())
        .map(|(g, h)| -g / (h + reg_lambda))
        .collect();

    SymmetricTree { splits, leaf_values }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.config.n_estimators = n;
        self
    }

    pub fn with_bagging_temperature(mut self, temperature: f64) -> Self {
        self.config.bagging_temperature = temperature;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.base_prediction
            + self
                .trees
                .iter()
                .map(|t| self.config.learning_rate * t.predict(row))
                .sum::<f64>()
    }
}

impl Regressor for CatBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.config.n_estimators == 0 || self.config.max_depth == 0 || self.config.max_depth > 16 {
            return Err(ScorecastError::InvalidParameter {
                name: "n_estimators/max_depth".to_string(),
                value: format!("{}/{}", self.config.n_estimators, self.config.max_depth),
                reason: "need at least one tree and a depth in 1..=16".to_string(),
            });
        }
        if self.config.border_count == 0 || self.config.border_count > u16::MAX as usize {
            return Err(ScorecastError::InvalidParameter {
                name: "border_count".to_string(),
                value: self.config.border_count.to_string(),
                reason: "must be in 1..=65535".to_string(),
            });
        }

        let n = x.nrows();
        let borders = compute_borders(x, self.config.border_count);
        let bins = quantize(x, &borders);

        self.base_prediction = y.mean().unwrap_or(0.0);
        self.trees.clear();

        let mut preds = vec![self.base_prediction; n];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let temperature = self.config.bagging_temperature;

        for _ in 0..self.config.n_estimators {
            let weights: Vec<f64> = if temperature > 0.0 {
                (0..n)
                    .map(|_| {
                        let u: f64 = rng.gen_range(f64::EPSILON..1.0);
                        (-u.ln()).powf(temperature)
                    })
                    .collect()
            } else {
                vec![1.0; n]
            };

            // Squared error: g = w * (pred - y), h = w
            let grad: Vec<f64> = (0..n).map(|i| weights[i] * (preds[i] - y[i])).collect();
            let tree = build_symmetric_tree(
                &bins,
                &borders,
                &grad,
                &weights,
                self.config.max_depth,
                self.config.reg_lambda,
            );

            for (i, row) in x.outer_iter().enumerate() {
                preds[i] += self.config.learning_rate * tree.predict(row);
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

        let preds: Vec<f64> = x
            .outer_iter()
            .into_par_iter()
            .map(|row| self.predict_row(row))
            .collect();
        Ok(Array1::from_vec(preds))
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn n_features(&self) -> Option<usize> {
        self.is_fitted().then_some(self.n_features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::r2_score;
    use ndarray::array;

    fn make_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((120, 3), |(i, j)| ((i * (2 * j + 5)) % 29) as f64);
        let y = x.map_axis(ndarray::Axis(1), |r| 2.0 * r[0] + r[1] - 0.5 * r[2]);
        (x, y)
    }

    #[test]
    fn test_catboost_regressor() {
        let (x, y) = make_data();
        let mut model = CatBoostRegressor::default();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_trees(), 100);
        let r2 = r2_score(&y, &model.predict(&x).unwrap());
        assert!(r2 > 0.9, "r2 = {}", r2);
    }

    #[test]
    fn test_borders_and_bins() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [2.0, 0.0], [4.0, 1.0]];
        let borders = compute_borders(&x, 254);
        assert_eq!(borders[0], vec![1.5, 3.0]);
        assert_eq!(borders[1], vec![0.5]);

        let bins = quantize(&x, &borders);
        assert_eq!(bins.column(0).to_vec(), vec![0, 1, 1, 2]);
        assert_eq!(bins.column(1).to_vec(), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_border_count_caps_candidates() {
        let x = Array2::from_shape_fn((100, 1), |(i, _)| i as f64);
        let borders = compute_borders(&x, 8);
        assert!(borders[0].len() <= 8);
        assert!(borders[0].windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_symmetric_tree_leaf_count() {
        let (x, y) = make_data();
        let mut model = CatBoostRegressor::default().with_n_estimators(3);
        model.fit(&x, &y).unwrap();
        for tree in &model.trees {
            assert_eq!(tree.leaf_values.len(), 1 << tree.splits.len());
        }
    }

    #[test]
    fn test_seed_reproducible() {
        let (x, y) = make_data();
        let mut a = CatBoostRegressor::default().with_n_estimators(10);
        let mut b = CatBoostRegressor::default().with_n_estimators(10);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_zero_temperature_ignores_seed() {
        let (x, y) = make_data();
        let mut a = CatBoostRegressor::default()
            .with_n_estimators(10)
            .with_bagging_temperature(0.0);
        let mut b = CatBoostRegressor::new(CatBoostConfig {
            random_state: 7,
            ..CatBoostConfig::default()
        })
        .with_n_estimators(10)
        .with_bagging_temperature(0.0);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());

        let mut bagged = CatBoostRegressor::new(CatBoostConfig {
            random_state: 7,
            ..CatBoostConfig::default()
        })
        .with_n_estimators(10);
        bagged.fit(&x, &y).unwrap();
        assert_ne!(a.predict(&x).unwrap(), bagged.predict(&x).unwrap());
    }
}
