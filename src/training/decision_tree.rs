//! CART regression tree (MSE criterion)

use super::models::{check_prediction_width, check_training_data, Regressor};
use crate::error::{Result, ScorecastError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Splits that reduce squared error by less than this are ignored
const MIN_GAIN: f64 = 1e-12;

/// Tree node, stored in a flat arena and addressed by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
    },
}

/// Decision tree configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeConfig {
    /// Maximum depth, unlimited when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples in each leaf
    pub min_samples_leaf: usize,
    /// Features drawn per split, all when `None`
    pub max_features: Option<usize>,
    /// Seed for per-split feature sampling
    pub random_state: u64,
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            random_state: 42,
        }
    }
}

impl DecisionTreeConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.min_samples_split < 2 {
            return Err(ScorecastError::InvalidParameter {
                name: "min_samples_split".to_string(),
                value: self.min_samples_split.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if self.min_samples_leaf == 0 {
            return Err(ScorecastError::InvalidParameter {
                name: "min_samples_leaf".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_features == Some(0) {
            return Err(ScorecastError::InvalidParameter {
                name: "max_features".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Regression tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    config: DecisionTreeConfig,
    nodes: Vec<TreeNode>,
    n_features: usize,
}

struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

impl DecisionTreeRegressor {
    pub fn new(config: DecisionTreeConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.config.min_samples_leaf = min_samples;
        self
    }

    pub fn config(&self) -> &DecisionTreeConfig {
        &self.config
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Depth of the fitted tree (a single leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Route a single row to its leaf value
    pub(crate) fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature_idx] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    fn push_leaf(&mut self, y: &Array1<f64>, indices: &[usize]) -> usize {
        let value = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
        self.nodes.push(TreeNode::Leaf {
            value,
            n_samples: indices.len(),
        });
        self.nodes.len() - 1
    }

    fn build_tree(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let n_samples = indices.len();

        let should_stop = n_samples < self.config.min_samples_split
            || n_samples < 2 * self.config.min_samples_leaf
            || self.config.max_depth.map_or(false, |d| depth >= d)
            || is_constant(y, indices);

        if should_stop {
            return self.push_leaf(y, indices);
        }

        let features = self.draw_features(x.ncols(), rng);
        let best = match find_best_split(x, y, indices, &features, self.config.min_samples_leaf) {
            Some(best) => best,
            None => return self.push_leaf(y, indices),
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        // Reserve the split slot so the root stays at index 0
        let slot = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: 0.0,
            n_samples,
        });

        let left = self.build_tree(x, y, &left_indices, depth + 1, rng);
        let right = self.build_tree(x, y, &right_indices, depth + 1, rng);

        self.nodes[slot] = TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
        };
        slot
    }

    fn draw_features(&self, n_features: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.config.max_features {
            Some(k) if k < n_features => {
                let mut features = sample(rng, n_features, k).into_vec();
                features.sort_unstable();
                features
            }
            _ => (0..n_features).collect(),
        }
    }
}

fn is_constant(y: &Array1<f64>, indices: &[usize]) -> bool {
    let first = y[indices[0]];
    indices.iter().all(|&i| (y[i] - first).abs() < 1e-12)
}

/// Best MSE split over `features`. Each feature is scanned once over its
/// sorted values with running sums; features are scanned in parallel.
fn find_best_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    features: &[usize],
    min_samples_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let parent_score = total_sum * total_sum / n as f64;

    let per_feature: Vec<Option<SplitCandidate>> = features
        .par_iter()
        .map(|&feature_idx| {
            let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut best: Option<SplitCandidate> = None;
            let mut left_sum = 0.0;

            for pos in 1..n {
                left_sum += pairs[pos - 1].1;
                if pairs[pos - 1].0 == pairs[pos].0 {
                    continue;
                }
                let n_left = pos;
                let n_right = n - pos;
                if n_left < min_samples_leaf || n_right < min_samples_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                // Reduction in total squared error
                let gain = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64
                    - parent_score;

                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (pairs[pos - 1].0 + pairs[pos].0) / 2.0,
                        gain,
                    });
                }
            }
            best
        })
        .collect();

    // First feature wins ties
    per_feature.into_iter().flatten().fold(None, |acc, cand| match acc {
        Some(b) if b.gain >= cand.gain => Some(b),
        _ => Some(cand),
    })
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        self.config.validate()?;

        self.nodes.clear();
        self.n_features = x.ncols();

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.build_tree(x, y, &indices, 0, &mut rng);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.nodes.is_empty() {
            return Err(ScorecastError::ModelNotFitted);
        }
        check_prediction_width(self.n_features, x)?;

        let predictions: Vec<f64> = x.outer_iter().map(|row| self.predict_row(row)).collect();
        Ok(Array1::from_vec(predictions))
    }

    fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    fn n_features(&self) -> Option<usize> {
        self.is_fitted().then_some(self.n_features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 20.0, 20.0, 20.0];

        let mut tree = DecisionTreeRegressor::default();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.depth(), 1);
        let pred = tree.predict(&array![[0.0], [6.0], [7.0], [100.0]]).unwrap();
        assert_eq!(pred.to_vec(), vec![5.0, 5.0, 20.0, 20.0]);
    }

    #[test]
    fn test_unlimited_depth_memorizes() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 0.0]];
        let y = array![3.0, -1.0, 4.0, 1.0, 5.0];

        let mut tree = DecisionTreeRegressor::default();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(32, |i| (i * i) as f64);

        let mut tree = DecisionTreeRegressor::default().with_max_depth(3);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(10, |i| i as f64);

        let mut tree = DecisionTreeRegressor::default().with_min_samples_leaf(3);
        tree.fit(&x, &y).unwrap();
        for node in tree.nodes() {
            if let TreeNode::Leaf { n_samples, .. } = node {
                assert!(*n_samples >= 3);
            }
        }
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![7.0, 7.0, 7.0];
        let mut tree = DecisionTreeRegressor::default();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.predict(&array![[42.0]]).unwrap()[0], 7.0);
    }

    #[test]
    fn test_serde_round_trip_keeps_predictions() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let mut tree = DecisionTreeRegressor::default();
        tree.fit(&x, &y).unwrap();

        let json = serde_json::to_string(&tree).unwrap();
        let restored: DecisionTreeRegressor = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), tree.predict(&x).unwrap());
    }
}
