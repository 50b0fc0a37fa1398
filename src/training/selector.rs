//! Candidate evaluation and best-model selection
//!
//! Every catalog candidate is fitted on the training matrix and scored by
//! R² on the test matrix. Selection takes the first highest score in
//! catalog order and applies an acceptance threshold.

use super::catalog::{CandidateModel, ModelCatalog};
use super::metrics::RegressionMetrics;
use super::models::{FittedModel, ModelFamily, Regressor};
use crate::error::{Result, ResultExt, ScorecastError};
use crate::preprocessing::FeatureMatrix;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default acceptance threshold on test R²
pub const DEFAULT_MIN_SCORE: f64 = 0.6;

/// What to do when a candidate fails to fit or predict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure, score the candidate -inf and keep going
    #[default]
    Isolate,
    /// Stop the whole run on the first failure
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub min_score: f64,
    pub failure_policy: FailurePolicy,
    /// Evaluate candidates on the rayon pool
    pub parallel: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            failure_policy: FailurePolicy::Isolate,
            parallel: true,
        }
    }
}

/// Test-set outcome of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub name: String,
    pub family: ModelFamily,
    /// Test R², `-inf` for a failed candidate
    pub score: f64,
    pub metrics: Option<RegressionMetrics>,
    pub fit_time_secs: f64,
    /// Failure message when the candidate did not produce a score
    pub failure: Option<String>,
}

impl CandidateScore {
    pub fn scored(name: impl Into<String>, family: ModelFamily, score: f64) -> Self {
        Self {
            name: name.into(),
            family,
            score,
            metrics: None,
            fit_time_secs: 0.0,
            failure: None,
        }
    }

    pub fn failed(name: impl Into<String>, family: ModelFamily, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            family,
            score: f64::NEG_INFINITY,
            metrics: None,
            fit_time_secs: 0.0,
            failure: Some(reason.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Candidate scores in catalog order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMap {
    entries: Vec<CandidateScore>,
}

impl ScoreMap {
    pub fn new(entries: Vec<CandidateScore>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CandidateScore] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&CandidateScore> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.get(name).map(|e| e.score)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the first maximal score
    fn best_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            if entry.score.is_nan() {
                continue;
            }
            match best {
                Some(b) if self.entries[b].score >= entry.score => {}
                _ => best = Some(idx),
            }
        }
        best
    }
}

/// A candidate after a successful fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub name: String,
    pub family: ModelFamily,
    pub model: FittedModel,
    pub metrics: RegressionMetrics,
}

impl TrainedModel {
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model.predict(x)
    }
}

/// Scores plus the fitted models, both in catalog order
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub scores: ScoreMap,
    models: Vec<Option<TrainedModel>>,
}

impl Evaluation {
    /// Take ownership of the fitted model at `index`
    fn take_model(mut self, index: usize) -> Option<TrainedModel> {
        self.models.get_mut(index).and_then(Option::take)
    }
}

/// The accepted candidate
#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub model: TrainedModel,
    pub score: f64,
    /// Full leaderboard the selection was made from
    pub scores: ScoreMap,
}

impl SelectionResult {
    pub fn name(&self) -> &str {
        &self.model.name
    }

    pub fn family(&self) -> ModelFamily {
        self.model.family
    }
}

/// Fits, scores and selects among catalog candidates
#[derive(Debug, Clone)]
pub struct ModelSelector {
    catalog: ModelCatalog,
    config: SelectorConfig,
}

impl ModelSelector {
    pub fn new(catalog: ModelCatalog, config: SelectorConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Fit every candidate on the training data and score it on the test data.
    ///
    /// Under [`FailurePolicy::Isolate`] a failing candidate is recorded with
    /// a score of `-inf`; under [`FailurePolicy::Abort`] the first failure in
    /// catalog order is returned as a [`ScorecastError::CandidateFailure`].
    pub fn evaluate(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<Evaluation> {
        check_shapes(x_train, y_train, x_test, y_test)?;

        let start = Instant::now();
        let candidates = self.catalog.candidates();
        info!(
            candidates = candidates.len(),
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            features = x_train.ncols(),
            parallel = self.config.parallel,
            "Evaluating candidates"
        );

        let run = |candidate: &CandidateModel| evaluate_candidate(candidate, x_train, y_train, x_test, y_test);
        let outcomes: Vec<(CandidateScore, Option<TrainedModel>)> = if self.config.parallel {
            candidates.par_iter().map(run).collect()
        } else {
            candidates.iter().map(run).collect()
        };

        if self.config.failure_policy == FailurePolicy::Abort {
            if let Some((failed, _)) = outcomes.iter().find(|(s, _)| s.is_failure()) {
                return Err(ScorecastError::CandidateFailure {
                    name: failed.name.clone(),
                    reason: failed.failure.clone().unwrap_or_default(),
                });
            }
        }

        let (entries, models): (Vec<_>, Vec<_>) = outcomes.into_iter().unzip();
        let scores = ScoreMap::new(entries);

        for entry in scores.entries() {
            match &entry.failure {
                Some(reason) => warn!(candidate = %entry.name, reason = %reason, "Candidate failed"),
                None => info!(
                    candidate = %entry.name,
                    r2 = entry.score,
                    fit_secs = entry.fit_time_secs,
                    "Candidate scored"
                ),
            }
        }
        info!(elapsed_ms = start.elapsed().as_millis() as u64, "Evaluation finished");

        Ok(Evaluation { scores, models })
    }

    /// The first candidate with the highest score, if it clears the threshold
    pub fn select_best<'a>(&self, scores: &'a ScoreMap) -> Result<&'a CandidateScore> {
        select_best(scores, self.config.min_score)
    }

    /// Evaluate, select, and hand back the winning fitted model
    pub fn run(&self, train: &FeatureMatrix, test: &FeatureMatrix) -> Result<SelectionResult> {
        let evaluation = self.evaluate(&train.features, &train.targets, &test.features, &test.targets)?;
        let best = self.select_best(&evaluation.scores)?;

        let name = best.name.clone();
        let score = best.score;
        let index = evaluation
            .scores
            .entries()
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| ScorecastError::ComputationError(format!("selected '{}' missing from report", name)))?;

        let scores = evaluation.scores.clone();
        let model = evaluation
            .take_model(index)
            .ok_or_else(|| ScorecastError::ComputationError(format!("no fitted model kept for '{}'", name)))?;

        info!(model = %name, family = %model.family, r2 = score, "Selected model");
        Ok(SelectionResult { model, score, scores })
    }
}

/// First maximal score in order, gated by `min_score`
pub fn select_best(scores: &ScoreMap, min_score: f64) -> Result<&CandidateScore> {
    let best = scores
        .best_index()
        .map(|idx| &scores.entries()[idx])
        .ok_or_else(|| ScorecastError::NoViableModel {
            best: "<none>".to_string(),
            score: f64::NEG_INFINITY,
            threshold: min_score,
        })?;

    if best.score < min_score {
        return Err(ScorecastError::NoViableModel {
            best: best.name.clone(),
            score: best.score,
            threshold: min_score,
        });
    }
    Ok(best)
}

fn check_shapes(
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> Result<()> {
    if x_train.nrows() != y_train.len() {
        return Err(ScorecastError::ShapeError {
            expected: format!("{} training targets", x_train.nrows()),
            actual: format!("{}", y_train.len()),
        })
        .context("model selection");
    }
    if x_test.nrows() != y_test.len() {
        return Err(ScorecastError::ShapeError {
            expected: format!("{} test targets", x_test.nrows()),
            actual: format!("{}", y_test.len()),
        })
        .context("model selection");
    }
    if x_train.ncols() != x_test.ncols() {
        return Err(ScorecastError::ShapeError {
            expected: format!("{} test features", x_train.ncols()),
            actual: format!("{}", x_test.ncols()),
        })
        .context("model selection");
    }
    if x_test.nrows() == 0 {
        return Err(ScorecastError::DataError("test set is empty".to_string()));
    }
    Ok(())
}

fn evaluate_candidate(
    candidate: &CandidateModel,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> (CandidateScore, Option<TrainedModel>) {
    let family = candidate.family();
    let start = Instant::now();

    let outcome = fit_and_score(candidate, x_train, y_train, x_test, y_test);
    let fit_time_secs = start.elapsed().as_secs_f64();

    match outcome {
        Ok((model, metrics)) => {
            debug!(candidate = %candidate.name, r2 = metrics.r2, "Candidate fitted");
            let score = CandidateScore {
                name: candidate.name.clone(),
                family,
                score: metrics.r2,
                metrics: Some(metrics),
                fit_time_secs,
                failure: None,
            };
            let trained = TrainedModel {
                name: candidate.name.clone(),
                family,
                model,
                metrics,
            };
            (score, Some(trained))
        }
        Err(err) => {
            let mut score = CandidateScore::failed(&candidate.name, family, err.to_string());
            score.fit_time_secs = fit_time_secs;
            (score, None)
        }
    }
}

fn fit_and_score(
    candidate: &CandidateModel,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> Result<(FittedModel, RegressionMetrics)> {
    let mut model = candidate.spec.instantiate();
    model.fit(x_train, y_train)?;
    let predictions = model.predict(x_test)?;

    if predictions.iter().any(|p| !p.is_finite()) {
        return Err(ScorecastError::ComputationError(
            "model produced non-finite predictions".to_string(),
        ));
    }

    let metrics = RegressionMetrics::compute(y_test, &predictions);
    Ok((model, metrics))
}
