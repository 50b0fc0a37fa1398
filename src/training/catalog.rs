//! Declarative catalog of candidate regressors
//!
//! A catalog is an ordered list of named candidates. Declaration order is
//! the evaluation order and the tie-break order during selection.

use super::adaboost::{AdaBoostConfig, AdaBoostRegressor};
use super::catboost::{CatBoostConfig, CatBoostRegressor};
use super::decision_tree::{DecisionTreeConfig, DecisionTreeRegressor};
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::knn::{KNNConfig, KNNRegressor};
use super::linear_models::{LinearRegression, LinearRegressionConfig};
use super::models::{FittedModel, ModelFamily};
use super::random_forest::{RandomForestConfig, RandomForestRegressor};
use super::xgboost::{XGBoostConfig, XGBoostRegressor};
use crate::error::{Result, ScorecastError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default candidates in evaluation order
const DEFAULT_CANDIDATES: [(&str, ModelFamily); 8] = [
    ("Linear Regression", ModelFamily::LinearRegression),
    ("K-Neighbors Regressor", ModelFamily::KNeighbors),
    ("Decision Tree", ModelFamily::DecisionTree),
    ("Random Forest", ModelFamily::RandomForest),
    ("XGBoost", ModelFamily::XGBoost),
    ("Ada Boost", ModelFamily::AdaBoost),
    ("Gradient Boosting", ModelFamily::GradientBoosting),
    ("CatBoosting", ModelFamily::CatBoost),
];

/// Algorithm family plus its hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "params", rename_all = "snake_case")]
pub enum ModelSpec {
    LinearRegression(LinearRegressionConfig),
    KNeighbors(KNNConfig),
    DecisionTree(DecisionTreeConfig),
    RandomForest(RandomForestConfig),
    #[serde(rename = "xgboost")]
    XGBoost(XGBoostConfig),
    #[serde(rename = "adaboost")]
    AdaBoost(AdaBoostConfig),
    GradientBoosting(GradientBoostingConfig),
    #[serde(rename = "catboost")]
    CatBoost(CatBoostConfig),
}

impl ModelSpec {
    /// Library defaults for `family`, seeded with `random_state`
    pub fn default_for(family: ModelFamily, random_state: u64) -> Self {
        match family {
            ModelFamily::LinearRegression => ModelSpec::LinearRegression(LinearRegressionConfig::default()),
            ModelFamily::KNeighbors => ModelSpec::KNeighbors(KNNConfig::default()),
            ModelFamily::DecisionTree => ModelSpec::DecisionTree(DecisionTreeConfig {
                random_state,
                ..Default::default()
            }),
            ModelFamily::RandomForest => ModelSpec::RandomForest(RandomForestConfig {
                random_state,
                ..Default::default()
            }),
            ModelFamily::XGBoost => ModelSpec::XGBoost(XGBoostConfig {
                random_state,
                ..Default::default()
            }),
            ModelFamily::AdaBoost => ModelSpec::AdaBoost(AdaBoostConfig {
                random_state,
                ..Default::default()
            }),
            ModelFamily::GradientBoosting => ModelSpec::GradientBoosting(GradientBoostingConfig {
                random_state,
                ..Default::default()
            }),
            ModelFamily::CatBoost => ModelSpec::CatBoost(CatBoostConfig {
                random_state,
                ..Default::default()
            }),
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            ModelSpec::LinearRegression(_) => ModelFamily::LinearRegression,
            ModelSpec::KNeighbors(_) => ModelFamily::KNeighbors,
            ModelSpec::DecisionTree(_) => ModelFamily::DecisionTree,
            ModelSpec::RandomForest(_) => ModelFamily::RandomForest,
            ModelSpec::XGBoost(_) => ModelFamily::XGBoost,
            ModelSpec::AdaBoost(_) => ModelFamily::AdaBoost,
            ModelSpec::GradientBoosting(_) => ModelFamily::GradientBoosting,
            ModelSpec::CatBoost(_) => ModelFamily::CatBoost,
        }
    }

    /// Fresh, unfitted model for this spec
    pub fn instantiate(&self) -> FittedModel {
        match self {
            ModelSpec::LinearRegression(c) => FittedModel::LinearRegression(LinearRegression::new(c.clone())),
            ModelSpec::KNeighbors(c) => FittedModel::KNeighbors(KNNRegressor::new(c.clone())),
            ModelSpec::DecisionTree(c) => FittedModel::DecisionTree(DecisionTreeRegressor::new(c.clone())),
            ModelSpec::RandomForest(c) => FittedModel::RandomForest(RandomForestRegressor::new(c.clone())),
            ModelSpec::XGBoost(c) => FittedModel::XGBoost(XGBoostRegressor::new(c.clone())),
            ModelSpec::AdaBoost(c) => FittedModel::AdaBoost(AdaBoostRegressor::new(c.clone())),
            ModelSpec::GradientBoosting(c) => {
                FittedModel::GradientBoosting(GradientBoostingRegressor::new(c.clone()))
            }
            ModelSpec::CatBoost(c) => FittedModel::CatBoost(CatBoostRegressor::new(c.clone())),
        }
    }
}

/// A named, unfitted catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateModel {
    pub name: String,
    pub spec: ModelSpec,
}

impl CandidateModel {
    pub fn new(name: impl Into<String>, spec: ModelSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    pub fn family(&self) -> ModelFamily {
        self.spec.family()
    }
}

/// Ordered, non-empty set of uniquely named candidates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    candidates: Vec<CandidateModel>,
}

impl ModelCatalog {
    /// Validate and wrap a candidate list
    pub fn new(candidates: Vec<CandidateModel>) -> Result<Self> {
        if candidates.is_empty() {
            return Err(ScorecastError::ConfigError(
                "model catalog must contain at least one candidate".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for candidate in &candidates {
            if candidate.name.trim().is_empty() {
                return Err(ScorecastError::ConfigError("candidate names must not be empty".to_string()));
            }
            if !seen.insert(candidate.name.as_str()) {
                return Err(ScorecastError::ConfigError(format!(
                    "duplicate candidate name '{}'",
                    candidate.name
                )));
            }
        }
        Ok(Self { candidates })
    }

    /// The eight default regressors, stochastic ones seeded with `random_state`
    pub fn default_regressors(random_state: u64) -> Self {
        let candidates = DEFAULT_CANDIDATES
            .iter()
            .map(|&(name, family)| CandidateModel::new(name, ModelSpec::default_for(family, random_state)))
            .collect();
        Self { candidates }
    }

    /// Keep only the named candidates, preserving catalog order
    pub fn restrict_to<S: AsRef<str>>(self, names: &[S]) -> Result<Self> {
        for name in names {
            if self.get(name.as_ref()).is_none() {
                return Err(ScorecastError::ConfigError(format!(
                    "unknown candidate '{}', expected one of: {}",
                    name.as_ref(),
                    self.names().join(", ")
                )));
            }
        }
        let candidates = self
            .candidates
            .into_iter()
            .filter(|c| names.iter().any(|n| n.as_ref() == c.name))
            .collect();
        Self::new(candidates)
    }

    pub fn candidates(&self) -> &[CandidateModel] {
        &self.candidates
    }

    pub fn get(&self, name: &str) -> Option<&CandidateModel> {
        self.candidates.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::default_regressors(42)
    }
}
