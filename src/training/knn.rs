//! K-Nearest Neighbors regression

use super::models::{check_prediction_width, check_training_data, Regressor};
use crate::error::{Result, ScorecastError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Uniform,
        }
    }
}

/// K-Nearest Neighbors regressor. Fitting stores the training set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KNNRegressor {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.config.weights = weights;
        self
    }
}

impl Regressor for KNNRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if self.config.n_neighbors == 0 {
            return Err(ScorecastError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.config.n_neighbors > x.nrows() {
            return Err(ScorecastError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: self.config.n_neighbors.to_string(),
                reason: format!("exceeds the {} training samples", x.nrows()),
            });
        }

        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x_train), Some(y_train)) => (x_train, y_train),
            _ => return Err(ScorecastError::ModelNotFitted),
        };
        check_prediction_width(x_train.ncols(), x)?;

        let k = self.config.n_neighbors;
        let metric = self.config.metric;
        let weights = self.config.weights;

        let predictions: Vec<f64> = x
            .outer_iter()
            .into_par_iter()
            .map(|row| {
                let neighbors = find_k_nearest(row, x_train, y_train, k, metric);
                weighted_mean_from(&neighbors, weights)
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }

    fn n_features(&self) -> Option<usize> {
        self.x_train.as_ref().map(|x| x.ncols())
    }
}

/// Max-heap entry keyed by (distance, training index); the earlier sample
/// wins a distance tie
struct Neighbor {
    dist: f64,
    index: usize,
    target: f64,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then(self.index.cmp(&other.index))
    }
}

/// k nearest neighbors as (distance, target), O(n log k)
fn find_k_nearest(
    point: ArrayView1<f64>,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<(f64, f64)> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (index, row) in x_train.outer_iter().enumerate() {
        let candidate = Neighbor {
            dist: compute_distance(point, row, metric),
            index,
            target: y_train[index],
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().map_or(false, |top| candidate < *top) {
            heap.pop();
            heap.push(candidate);
        }
    }

    heap.into_iter().map(|n| (n.dist, n.target)).collect()
}

fn compute_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    let pairs = a.iter().zip(b.iter());
    match metric {
        DistanceMetric::Euclidean => pairs
            .map(|(ai, bi)| {
                let d = ai - bi;
                d * d
            })
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => pairs.map(|(ai, bi)| (ai - bi).abs()).sum(),
        DistanceMetric::Minkowski(p) => pairs
            .map(|(ai, bi)| (ai - bi).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p),
    }
}

fn weighted_mean_from(neighbors: &[(f64, f64)], weights: WeightScheme) -> f64 {
    let uniform = || neighbors.iter().map(|(_, y)| y).sum::<f64>() / neighbors.len() as f64;
    match weights {
        WeightScheme::Uniform => uniform(),
        WeightScheme::Distance => {
            // An exact match takes the prediction outright
            let exact: Vec<f64> = neighbors.iter().filter(|(d, _)| *d == 0.0).map(|(_, y)| *y).collect();
            if !exact.is_empty() {
                return exact.iter().sum::<f64>() / exact.len() as f64;
            }
            let mut weighted_sum = 0.0;
            let mut weight_total = 0.0;
            for &(dist, y) in neighbors {
                let w = 1.0 / dist;
                weighted_sum += w * y;
                weight_total += w;
            }
            if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                uniform()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0], [7.0], [8.0]];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0];
        (x, y)
    }

    #[test]
    fn test_knn_regressor() {
        let (x, y) = create_regression_data();
        let mut knn = KNNRegressor::with_k(3);
        knn.fit(&x, &y).unwrap();

        // Neighbors of 4.4 are 4, 5, 3
        let pred = knn.predict(&array![[4.4]]).unwrap();
        assert!((pred[0] - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_tie_prefers_earlier_sample() {
        let x = array![[0.0], [2.0], [4.0]];
        let y = array![1.0, 3.0, 5.0];
        let mut knn = KNNRegressor::with_k(1);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&array![[1.0]]).unwrap()[0], 1.0);
    }

    #[test]
    fn test_distance_metrics() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_eq!(compute_distance(a.view(), b.view(), DistanceMetric::Euclidean), 5.0);
        assert_eq!(compute_distance(a.view(), b.view(), DistanceMetric::Manhattan), 7.0);
    }

    #[test]
    fn test_weighted_knn_exact_match() {
        let (x, y) = create_regression_data();
        let mut knn = KNNRegressor::with_k(3).with_weights(WeightScheme::Distance);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&array![[6.0]]).unwrap()[0], 12.0);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let mut knn = KNNRegressor::with_k(5);
        let result = knn.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]);
        assert!(matches!(result, Err(ScorecastError::InvalidParameter { .. })));
    }

    #[test]
    fn test_predict_before_fit() {
        let knn = KNNRegressor::default();
        assert!(matches!(knn.predict(&array![[1.0]]), Err(ScorecastError::ModelNotFitted)));
    }
}
