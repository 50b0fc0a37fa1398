//! Error types for the scorecast training pipeline

use thiserror::Error;

/// Result type alias for scorecast operations
pub type Result<T> = std::result::Result<T, ScorecastError>;

/// Main error type for scorecast
#[derive(Error, Debug)]
pub enum ScorecastError {
    /// Invalid column specification or pipeline configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Missing column, unreadable dataset or degenerate data
    #[error("Data error: {0}")]
    DataError(String),

    /// A single candidate failed to fit or predict
    #[error("Candidate '{name}' failed: {reason}")]
    CandidateFailure { name: String, reason: String },

    /// No candidate reached the acceptance threshold
    #[error("No viable model: best candidate '{best}' scored {score:.4}, below threshold {threshold}")]
    NoViableModel {
        best: String,
        score: f64,
        threshold: f64,
    },

    /// Artifact write or read failed
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Stage context wrapped around an underlying error
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ScorecastError>,
    },
}

impl ScorecastError {
    /// Wrap this error with a human-readable stage context
    pub fn context(self, context: impl Into<String>) -> Self {
        ScorecastError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any context wrappers
    pub fn root(&self) -> &ScorecastError {
        let mut err = self;
        while let ScorecastError::Context { source, .. } = err {
            err = source;
        }
        err
    }

    /// Whether the run was rejected by the quality gate
    pub fn is_no_viable_model(&self) -> bool {
        matches!(self.root(), ScorecastError::NoViableModel { .. })
    }
}

/// Attach stage context to a fallible result
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

impl From<polars::error::PolarsError> for ScorecastError {
    fn from(err: polars::error::PolarsError) -> Self {
        ScorecastError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ScorecastError {
    fn from(err: serde_json::Error) -> Self {
        ScorecastError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ScorecastError {
    fn from(err: ndarray::ShapeError) -> Self {
        ScorecastError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
