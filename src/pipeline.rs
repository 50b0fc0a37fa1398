//! End-to-end training run and artifact-backed inference
//!
//! A run reads the train and test tables, fits the feature transformer on
//! the training table, selects a model on the transformed matrices and only
//! then persists both fitted objects. Nothing is written for a run that
//! fails before persistence. If the model cannot be written, the transformer
//! path is put back the way the run found it, so a previous pair survives.

use crate::config::PipelineConfig;
use crate::error::{Result, ResultExt, ScorecastError};
use crate::export::{Artifact, ArtifactKind, ArtifactSink, FileArtifactSink};
use crate::preprocessing::{is_numeric_dtype, ColumnSpec, FeatureTransformer, FittedTransformer};
use crate::training::{ModelFamily, ModelSelector, Regressor, ScoreMap, SelectionResult, TrainedModel};
use crate::utils::DataLoader;
use ndarray::Array1;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model_name: String,
    pub family: ModelFamily,
    /// Test R² of the selected model
    pub score: f64,
    pub scores: ScoreMap,
    pub transformer_path: PathBuf,
    pub model_path: PathBuf,
}

/// Orchestrates transformation, selection and persistence
pub struct TrainingPipeline<S: ArtifactSink = FileArtifactSink> {
    config: PipelineConfig,
    sink: S,
    loader: DataLoader,
}

impl TrainingPipeline<FileArtifactSink> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_sink(config, FileArtifactSink::new())
    }
}

impl<S: ArtifactSink> TrainingPipeline<S> {
    pub fn with_sink(config: PipelineConfig, sink: S) -> Self {
        Self {
            config,
            sink,
            loader: DataLoader::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Load the configured train and test files, then train
    pub fn run(&self) -> Result<TrainingOutcome> {
        let train = self
            .loader
            .load_auto(&self.config.train_path)
            .context("loading training data")?;
        let test = self
            .loader
            .load_auto(&self.config.test_path)
            .context("loading test data")?;
        self.run_on(&train, &test)
    }

    /// Train on in-memory tables
    pub fn run_on(&self, train: &DataFrame, test: &DataFrame) -> Result<TrainingOutcome> {
        let start = Instant::now();
        self.config.validate().context("configuration")?;
        check_schema(train, test, &self.config.columns).context("data validation")?;

        let fitted = FeatureTransformer::build(self.config.columns.clone())
            .and_then(|t| t.fit(train))
            .context("feature transformation")?;
        let train_matrix = fitted.apply(train).context("transforming training data")?;
        let test_matrix = fitted.apply(test).context("transforming test data")?;

        let catalog = self.config.catalog().context("configuration")?;
        let selector = ModelSelector::new(catalog, self.config.selector_config());
        let selection = selector
            .run(&train_matrix, &test_matrix)
            .context("model selection")?;

        self.persist(&fitted, &selection)?;

        info!(
            model = %selection.name(),
            r2 = selection.score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training run finished"
        );

        Ok(TrainingOutcome {
            model_name: selection.name().to_string(),
            family: selection.family(),
            score: selection.score,
            scores: selection.scores,
            transformer_path: self.config.transformer_path.clone(),
            model_path: self.config.model_path.clone(),
        })
    }

    /// Write the transformer then the model; undo the transformer write if the model write fails
    fn persist(&self, fitted: &FittedTransformer, selection: &SelectionResult) -> Result<()> {
        let transformer_path = &self.config.transformer_path;
        let model_path = &self.config.model_path;

        let previous = if self.sink.exists(transformer_path) {
            let bytes = self
                .sink
                .read(transformer_path)
                .context("backing up previous transformer")?;
            Some(bytes)
        } else {
            None
        };

        let transformer_artifact = Artifact::new(ArtifactKind::Transformer, fitted)
            .with_metadata("target", &fitted.spec().target_column)
            .with_metadata("n_features", fitted.n_features())
            .with_metadata("n_samples_seen", fitted.n_samples_seen());
        self.sink
            .persist(&transformer_artifact, transformer_path)
            .context("saving transformer")?;

        let model_artifact = Artifact::new(ArtifactKind::Model, &selection.model)
            .with_metadata("name", selection.name())
            .with_metadata("family", selection.family())
            .with_metadata("r2", selection.score);

        if let Err(err) = self.sink.persist(&model_artifact, model_path) {
            self.roll_back(transformer_path, previous.as_deref());
            let err = if matches!(err.root(), ScorecastError::PersistenceError(_)) {
                err
            } else {
                ScorecastError::PersistenceError(err.to_string())
            };
            return Err(err.context("saving model"));
        }
        Ok(())
    }

    fn roll_back(&self, path: &Path, previous: Option<&[u8]>) {
        let restored = match previous {
            Some(bytes) => self.sink.write(path, bytes),
            None => self.sink.discard(path),
        };
        match restored {
            Ok(()) => info!(
                path = %path.display(),
                restored_previous = previous.is_some(),
                "Rolled back transformer artifact"
            ),
            Err(err) => warn!(
                path = %path.display(),
                error = %err,
                "Could not roll back transformer artifact"
            ),
        }
    }
}

/// Train and test must carry the same columns. Categorical columns must
/// match type exactly, everything else must agree on numeric/non-numeric.
fn check_schema(train: &DataFrame, test: &DataFrame, columns: &ColumnSpec) -> Result<()> {
    for col in train.get_columns() {
        let other = test.column(col.name()).map_err(|_| {
            ScorecastError::DataError(format!("column '{}' is missing from the test data", col.name()))
        })?;
        let categorical = columns
            .categorical_columns
            .iter()
            .any(|name| name.as_str() == col.name().as_str());
        let mismatch = if categorical {
            col.dtype() != other.dtype()
        } else {
            is_numeric_dtype(col.dtype()) != is_numeric_dtype(other.dtype())
        };
        if mismatch {
            return Err(ScorecastError::DataError(format!(
                "column '{}' is {} in the training data but {} in the test data",
                col.name(),
                col.dtype(),
                other.dtype()
            )));
        }
    }
    if let Some(extra) = test
        .get_column_names()
        .into_iter()
        .find(|name| train.column(name.as_str()).is_err())
    {
        return Err(ScorecastError::DataError(format!(
            "column '{}' is missing from the training data",
            extra
        )));
    }
    Ok(())
}

/// Reloaded transformer and model, ready to score new rows
#[derive(Debug, Clone)]
pub struct Predictor {
    transformer: FittedTransformer,
    model: TrainedModel,
}

impl Predictor {
    /// Load both artifacts from the filesystem
    pub fn load(transformer_path: &Path, model_path: &Path) -> Result<Self> {
        Self::load_from(&FileArtifactSink::new(), transformer_path, model_path)
    }

    pub fn load_from<S: ArtifactSink>(sink: &S, transformer_path: &Path, model_path: &Path) -> Result<Self> {
        let transformer = sink
            .load::<FittedTransformer>(transformer_path, ArtifactKind::Transformer)
            .with_context(|| format!("loading transformer '{}'", transformer_path.display()))?
            .into_payload();
        let model = sink
            .load::<TrainedModel>(model_path, ArtifactKind::Model)
            .with_context(|| format!("loading model '{}'", model_path.display()))?
            .into_payload();

        let predictor = Self::from_parts(transformer, model)?;
        info!(
            model = %predictor.model.name,
            family = %predictor.model.family,
            features = predictor.transformer.n_features(),
            "Loaded predictor"
        );
        Ok(predictor)
    }

    /// Pair a transformer with a model fitted on its output
    pub fn from_parts(transformer: FittedTransformer, model: TrainedModel) -> Result<Self> {
        match model.model.n_features() {
            Some(width) if width == transformer.n_features() => Ok(Self { transformer, model }),
            Some(width) => Err(ScorecastError::PersistenceError(format!(
                "model expects {} features but the transformer produces {}",
                width,
                transformer.n_features()
            ))),
            None => Err(ScorecastError::PersistenceError(format!(
                "model '{}' was saved unfitted",
                model.name
            ))),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model.name
    }

    pub fn family(&self) -> ModelFamily {
        self.model.family
    }

    pub fn transformer(&self) -> &FittedTransformer {
        &self.transformer
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Predict the target for every row; the target column need not be present
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let features = self.transformer.transform(df).context("feature transformation")?;
        self.model.predict(&features).context("prediction")
    }
}
