//! Scorecast - tabular regression training
//!
//! Trains a regression model on a mixed numeric/categorical dataset:
//! - Column-routed preprocessing (impute + scale / impute + one-hot)
//! - Eight candidate regressors fitted and scored by test R²
//! - Threshold-gated selection of the best candidate
//! - Versioned JSON artifacts for the fitted transformer and model
//!
//! # Modules
//!
//! - [`preprocessing`] - Column spec and the two-phase feature transformer
//! - [`training`] - Regressors, the model catalog and the selector
//! - [`export`] - Artifact envelope and sinks
//! - [`pipeline`] - End-to-end training run and artifact-backed prediction
//! - [`config`] - Pipeline configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod training;

// Persistence and orchestration
pub mod config;
pub mod export;
pub mod pipeline;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, ScorecastError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, ResultExt, ScorecastError};

    // Preprocessing
    pub use crate::preprocessing::{ColumnSpec, FeatureMatrix, FeatureTransformer, FittedTransformer};

    // Training
    pub use crate::training::{
        r2_score, CandidateModel, FailurePolicy, FittedModel, ModelCatalog, ModelFamily, ModelSelector,
        Regressor, ScoreMap, SelectionResult, SelectorConfig, TrainedModel,
    };

    // Export
    pub use crate::export::{Artifact, ArtifactKind, ArtifactSink, FileArtifactSink};

    // Pipeline
    pub use crate::config::PipelineConfig;
    pub use crate::pipeline::{Predictor, TrainingOutcome, TrainingPipeline};
}
