//! Pipeline configuration

use crate::error::{Result, ScorecastError};
use crate::preprocessing::ColumnSpec;
use crate::training::{FailurePolicy, ModelCatalog, SelectorConfig, DEFAULT_MIN_SCORE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// End-to-end training run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub columns: ColumnSpec,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    /// Destination of the fitted transformer artifact
    pub transformer_path: PathBuf,
    /// Destination of the selected model artifact
    pub model_path: PathBuf,
    /// Minimum test R² for a model to be accepted
    pub min_score: f64,
    pub failure_policy: FailurePolicy,
    pub parallel: bool,
    pub random_state: u64,
    /// Restrict the catalog to these candidate names
    pub models: Option<Vec<String>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnSpec::student_performance(),
            train_path: PathBuf::from("artifacts/train.csv"),
            test_path: PathBuf::from("artifacts/test.csv"),
            transformer_path: PathBuf::from("artifacts/preprocessor.json"),
            model_path: PathBuf::from("artifacts/model.json"),
            min_score: DEFAULT_MIN_SCORE,
            failure_policy: FailurePolicy::Isolate,
            parallel: true,
            random_state: 42,
            models: None,
        }
    }
}

impl PipelineConfig {
    pub fn new(train_path: impl Into<PathBuf>, test_path: impl Into<PathBuf>) -> Self {
        Self {
            train_path: train_path.into(),
            test_path: test_path.into(),
            ..Default::default()
        }
    }

    /// Read a JSON config; absent fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ScorecastError::ConfigError(format!("cannot read config '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            ScorecastError::ConfigError(format!("invalid config '{}': {}", path.display(), e))
        })
    }

    pub fn with_columns(mut self, columns: ColumnSpec) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.transformer_path = dir.join("preprocessor.json");
        self.model_path = dir.join("model.json");
        self
    }

    pub fn with_transformer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.transformer_path = path.into();
        self
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_models<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.models = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.columns.validate()?;

        if !self.min_score.is_finite() {
            return Err(ScorecastError::ConfigError(format!(
                "min_score must be finite, got {}",
                self.min_score
            )));
        }
        if self.transformer_path == self.model_path {
            return Err(ScorecastError::ConfigError(format!(
                "transformer and model artifacts share the path '{}'",
                self.model_path.display()
            )));
        }
        if matches!(&self.models, Some(names) if names.is_empty()) {
            return Err(ScorecastError::ConfigError("model filter is empty".to_string()));
        }
        Ok(())
    }

    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            min_score: self.min_score,
            failure_policy: self.failure_policy,
            parallel: self.parallel,
        }
    }

    /// Default catalog seeded with `random_state`, narrowed by `models`
    pub fn catalog(&self) -> Result<ModelCatalog> {
        let catalog = ModelCatalog::default_regressors(self.random_state);
        match &self.models {
            Some(names) => catalog.restrict_to(names.as_slice()),
            None => Ok(catalog),
        }
    }
}
