//! Model training module
//!
//! Regression candidates and their selection:
//! - Linear models (OLS)
//! - K-Nearest Neighbors
//! - Decision trees and Random Forests
//! - Boosting: XGBoost, AdaBoost.R2, gradient boosting, CatBoost-style symmetric trees
//! - A declarative catalog and an R²-based selector

pub mod adaboost;
pub mod catalog;
pub mod catboost;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
mod metrics;
mod models;
pub mod random_forest;
pub mod selector;
pub mod xgboost;

pub use adaboost::{AdaBoostConfig, AdaBoostLoss, AdaBoostRegressor};
pub use catalog::{CandidateModel, ModelCatalog, ModelSpec};
pub use catboost::{CatBoostConfig, CatBoostRegressor};
pub use decision_tree::{DecisionTreeConfig, DecisionTreeRegressor, TreeNode};
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, WeightScheme};
pub use linear_models::{LinearRegression, LinearRegressionConfig};
pub use metrics::{r2_score, RegressionMetrics};
pub use models::{FittedModel, ModelFamily, Regressor};
pub use random_forest::{MaxFeatures, RandomForestConfig, RandomForestRegressor};
pub use selector::{
    select_best, CandidateScore, Evaluation, FailurePolicy, ModelSelector, ScoreMap, SelectionResult,
    SelectorConfig, TrainedModel, DEFAULT_MIN_SCORE,
};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
