//! Regressor trait and the serializable fitted-model enum

use super::adaboost::AdaBoostRegressor;
use super::catboost::CatBoostRegressor;
use super::decision_tree::DecisionTreeRegressor;
use super::gradient_boosting::GradientBoostingRegressor;
use super::knn::KNNRegressor;
use super::linear_models::LinearRegression;
use super::random_forest::RandomForestRegressor;
use super::xgboost::XGBoostRegressor;
use crate::error::{Result, ScorecastError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait implemented by every catalog algorithm
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn is_fitted(&self) -> bool;

    /// Number of input features seen during fit
    fn n_features(&self) -> Option<usize>;
}

/// Algorithm family of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    LinearRegression,
    KNeighbors,
    DecisionTree,
    RandomForest,
    XGBoost,
    AdaBoost,
    GradientBoosting,
    CatBoost,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 8] = [
        ModelFamily::LinearRegression,
        ModelFamily::KNeighbors,
        ModelFamily::DecisionTree,
        ModelFamily::RandomForest,
        ModelFamily::XGBoost,
        ModelFamily::AdaBoost,
        ModelFamily::GradientBoosting,
        ModelFamily::CatBoost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::LinearRegression => "linear_regression",
            ModelFamily::KNeighbors => "k_neighbors",
            ModelFamily::DecisionTree => "decision_tree",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::XGBoost => "xgboost",
            ModelFamily::AdaBoost => "adaboost",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::CatBoost => "catboost",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog model instance, fitted in place by [`Regressor::fit`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "model", rename_all = "snake_case")]
pub enum FittedModel {
    LinearRegression(LinearRegression),
    KNeighbors(KNNRegressor),
    DecisionTree(DecisionTreeRegressor),
    RandomForest(RandomForestRegressor),
    #[serde(rename = "xgboost")]
    XGBoost(XGBoostRegressor),
    #[serde(rename = "adaboost")]
    AdaBoost(AdaBoostRegressor),
    GradientBoosting(GradientBoostingRegressor),
    #[serde(rename = "catboost")]
    CatBoost(CatBoostRegressor),
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        match self {
            FittedModel::LinearRegression(_) => ModelFamily::LinearRegression,
            FittedModel::KNeighbors(_) => ModelFamily::KNeighbors,
            FittedModel::DecisionTree(_) => ModelFamily::DecisionTree,
            FittedModel::RandomForest(_) => ModelFamily::RandomForest,
            FittedModel::XGBoost(_) => ModelFamily::XGBoost,
            FittedModel::AdaBoost(_) => ModelFamily::AdaBoost,
            FittedModel::GradientBoosting(_) => ModelFamily::GradientBoosting,
            FittedModel::CatBoost(_) => ModelFamily::CatBoost,
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            FittedModel::LinearRegression(m) => m,
            FittedModel::KNeighbors(m) => m,
            FittedModel::DecisionTree(m) => m,
            FittedModel::RandomForest(m) => m,
            FittedModel::XGBoost(m) => m,
            FittedModel::AdaBoost(m) => m,
            FittedModel::GradientBoosting(m) => m,
            FittedModel::CatBoost(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            FittedModel::LinearRegression(m) => m,
            FittedModel::KNeighbors(m) => m,
            FittedModel::DecisionTree(m) => m,
            FittedModel::RandomForest(m) => m,
            FittedModel::XGBoost(m) => m,
            FittedModel::AdaBoost(m) => m,
            FittedModel::GradientBoosting(m) => m,
            FittedModel::CatBoost(m) => m,
        }
    }
}

impl Regressor for FittedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }

    fn n_features(&self) -> Option<usize> {
        self.inner().n_features()
    }
}

/// Reject empty or misaligned training data
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ScorecastError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(ScorecastError::DataError(
            "cannot fit on an empty training set".to_string(),
        ));
    }
    if x.ncols() == 0 {
        return Err(ScorecastError::DataError(
            "cannot fit on a matrix with no features".to_string(),
        ));
    }
    Ok(())
}

/// Reject prediction input whose width differs from the fitted width
pub(crate) fn check_prediction_width(fitted: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != fitted {
        return Err(ScorecastError::ShapeError {
            expected: format!("{} features", fitted),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}
