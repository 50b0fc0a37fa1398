//! Integration test: Full pipeline (load → transform → select → persist → predict)

use polars::prelude::*;
use rand::prelude::*;
use rand::rngs::StdRng;
use scorecast::config::PipelineConfig;
use scorecast::export::{ArtifactSink, FileArtifactSink};
use scorecast::pipeline::{Predictor, TrainingPipeline};
use scorecast::training::{r2_score, FailurePolicy};
use scorecast::utils::DataSaver;
use scorecast::{Result, ScorecastError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const GENDERS: [&str; 2] = ["female", "male"];
const GROUPS: [&str; 5] = ["group A", "group B", "group C", "group D", "group E"];
const EDUCATION: [&str; 6] = [
    "associate's degree",
    "bachelor's degree",
    "high school",
    "master's degree",
    "some college",
    "some high school",
];
const LUNCH: [&str; 2] = ["free/reduced", "standard"];
const PREP: [&str; 2] = ["completed", "none"];

/// Student performance rows; `signal` scales how much of math_score the features explain
fn student_df(n: usize, seed: u64, signal: f64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut gender = Vec::with_capacity(n);
    let mut race = Vec::with_capacity(n);
    let mut education = Vec::with_capacity(n);
    let mut lunch = Vec::with_capacity(n);
    let mut prep = Vec::with_capacity(n);
    let mut reading = Vec::with_capacity(n);
    let mut writing = Vec::with_capacity(n);
    let mut math = Vec::with_capacity(n);

    for _ in 0..n {
        let g = GENDERS[rng.gen_range(0..GENDERS.len())];
        let l = LUNCH[rng.gen_range(0..LUNCH.len())];
        let p = PREP[rng.gen_range(0..PREP.len())];
        let r: f64 = rng.gen_range(30.0..100.0);
        let w: f64 = r + rng.gen_range(-8.0..8.0);
        let noise: f64 = rng.gen_range(-20.0..20.0);

        let gender_effect = if g == "male" { 5.0 } else { -2.0 };
        let lunch_effect = if l == "standard" { 4.0 } else { -4.0 };
        let prep_effect = if p == "completed" { 3.0 } else { 0.0 };
        let explained = 0.5 * r + 0.4 * w + gender_effect + lunch_effect + prep_effect;

        gender.push(g);
        race.push(GROUPS[rng.gen_range(0..GROUPS.len())]);
        education.push(EDUCATION[rng.gen_range(0..EDUCATION.len())]);
        lunch.push(l);
        prep.push(p);
        reading.push(r.round());
        writing.push(w.round());
        math.push(signal * explained + (1.0 - signal) * (60.0 + noise) + signal * noise * 0.1);
    }

    df!(
        "gender" => gender,
        "race_ethnicity" => race,
        "parental_level_of_education" => education,
        "lunch" => lunch,
        "test_preparation_course" => prep,
        "math_score" => math,
        "reading_score" => reading,
        "writing_score" => writing
    )
    .unwrap()
}

/// Writes through to disk but refuses the model artifact
struct RejectModelSink {
    inner: FileArtifactSink,
    discards: AtomicUsize,
}

impl RejectModelSink {
    fn new() -> Self {
        Self {
            inner: FileArtifactSink::new(),
            discards: AtomicUsize::new(0),
        }
    }
}

impl ArtifactSink for RejectModelSink {
    fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if path.file_name().map_or(false, |n| n == "model.json") {
            return Err(ScorecastError::PersistenceError("disk full".to_string()));
        }
        self.inner.write(path, bytes)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn discard(&self, path: &Path) -> Result<()> {
        self.discards.fetch_add(1, Ordering::SeqCst);
        self.inner.discard(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }
}

#[test]
fn test_train_from_csv_and_predict() {
    let dir = TempDir::new().unwrap();
    let train_path = dir.path().join("data").join("train.csv");
    let test_path = dir.path().join("data").join("test.csv");
    let mut train = student_df(240, 11, 1.0);
    let mut test = student_df(80, 12, 1.0);
    DataSaver::save_csv(&mut train, &train_path).unwrap();
    DataSaver::save_csv(&mut test, &test_path).unwrap();

    let config = PipelineConfig::new(&train_path, &test_path).with_artifact_dir(dir.path().join("artifacts"));
    let outcome = TrainingPipeline::new(config).run().unwrap();

    assert!(outcome.score >= 0.6);
    assert_eq!(outcome.scores.len(), 8);
    assert_eq!(outcome.scores.score(&outcome.model_name), Some(outcome.score));
    assert!(outcome.transformer_path.exists());
    assert!(outcome.model_path.exists());

    // Reloaded artifacts reproduce the reported test score
    let predictor = Predictor::load(&outcome.transformer_path, &outcome.model_path).unwrap();
    assert_eq!(predictor.model_name(), outcome.model_name);
    assert_eq!(predictor.family(), outcome.family);

    let preds = predictor.predict(&test).unwrap();
    let y: Vec<f64> = test
        .column("math_score")
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    let r2 = r2_score(&ndarray::Array1::from_vec(y), &preds);
    assert!((r2 - outcome.score).abs() < 1e-9);
}

#[test]
fn test_predict_without_target_column() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::default()
        .with_artifact_dir(dir.path())
        .with_models(["Linear Regression", "Gradient Boosting"]);
    let outcome = TrainingPipeline::new(config)
        .run_on(&student_df(200, 21, 1.0), &student_df(50, 22, 1.0))
        .unwrap();

    let predictor = Predictor::load(&outcome.transformer_path, &outcome.model_path).unwrap();
    let unlabeled = student_df(5, 23, 1.0).drop("math_score").unwrap();
    let preds = predictor.predict(&unlabeled).unwrap();
    assert_eq!(preds.len(), 5);
    assert!(preds.iter().all(|p| p.is_finite()));
}

#[test]
fn test_no_viable_model_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let pipeline = TrainingPipeline::new(config.clone());

    // Target is pure noise: nothing can explain it
    let err = pipeline
        .run_on(&student_df(200, 31, 0.0), &student_df(60, 32, 0.0))
        .unwrap_err();

    assert!(err.is_no_viable_model(), "unexpected error: {}", err);
    assert!(!config.transformer_path.exists());
    assert!(!config.model_path.exists());
}

#[test]
fn test_failed_model_write_rolls_back_transformer() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::default()
        .with_artifact_dir(dir.path())
        .with_models(["Linear Regression"]);
    let pipeline = TrainingPipeline::with_sink(config.clone(), RejectModelSink::new());

    let err = pipeline
        .run_on(&student_df(150, 41, 1.0), &student_df(40, 42, 1.0))
        .unwrap_err();

    assert!(matches!(err.root(), ScorecastError::PersistenceError(_)));
    assert_eq!(pipeline.sink().discards.load(Ordering::SeqCst), 1);
    assert!(!config.transformer_path.exists());
    assert!(!config.model_path.exists());
}

#[test]
fn test_failed_rerun_keeps_previous_artifacts() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::default()
        .with_artifact_dir(dir.path())
        .with_models(["Linear Regression"]);

    let first = TrainingPipeline::new(config.clone())
        .run_on(&student_df(150, 43, 1.0), &student_df(40, 44, 1.0))
        .unwrap();
    let transformer_bytes = std::fs::read(&first.transformer_path).unwrap();
    let model_bytes = std::fs::read(&first.model_path).unwrap();

    // Different data, so the second transformer would differ from the first
    let pipeline = TrainingPipeline::with_sink(config.clone(), RejectModelSink::new());
    let err = pipeline
        .run_on(&student_df(150, 45, 1.0), &student_df(40, 46, 1.0))
        .unwrap_err();
    assert!(matches!(err.root(), ScorecastError::PersistenceError(_)));
    assert_eq!(pipeline.sink().discards.load(Ordering::SeqCst), 0);

    assert_eq!(std::fs::read(&config.transformer_path).unwrap(), transformer_bytes);
    assert_eq!(std::fs::read(&config.model_path).unwrap(), model_bytes);

    let predictor = Predictor::load(&config.transformer_path, &config.model_path).unwrap();
    assert_eq!(predictor.model_name(), first.model_name);
    assert_eq!(predictor.predict(&student_df(10, 47, 1.0)).unwrap().len(), 10);
}

#[test]
fn test_categorical_type_change_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::default()
        .with_artifact_dir(dir.path())
        .with_models(["Linear Regression"]);

    // lunch coded 0/1: integers in train, floats in test
    let mut train = student_df(100, 53, 1.0);
    let mut test = student_df(30, 54, 1.0);
    let train_codes: Vec<i64> = lunch_codes(&train);
    let test_codes: Vec<f64> = lunch_codes(&test).into_iter().map(|c| c as f64).collect();
    train.with_column(Series::new("lunch".into(), train_codes)).unwrap();
    test.with_column(Series::new("lunch".into(), test_codes)).unwrap();

    let err = TrainingPipeline::new(config.clone()).run_on(&train, &test).unwrap_err();
    assert!(matches!(err.root(), ScorecastError::DataError(_)));
    assert!(err.to_string().contains("lunch"));
    assert!(!config.transformer_path.exists());
    assert!(!config.model_path.exists());
}

fn lunch_codes(df: &DataFrame) -> Vec<i64> {
    df.column("lunch")
        .unwrap()
        .str()
        .unwrap()
        .into_no_null_iter()
        .map(|v| i64::from(v == "standard"))
        .collect()
}

#[test]
fn test_schema_mismatch_is_rejected_before_training() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let train = student_df(100, 51, 1.0);
    let test = student_df(30, 52, 1.0).drop("lunch").unwrap();

    let err = TrainingPipeline::new(config.clone()).run_on(&train, &test).unwrap_err();
    assert!(matches!(err.root(), ScorecastError::DataError(_)));
    assert!(!config.transformer_path.exists());
}

#[test]
fn test_missing_numeric_column_fails_before_selection() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::default().with_artifact_dir(dir.path());
    let train = student_df(100, 61, 1.0).drop("reading_score").unwrap();
    let test = student_df(30, 62, 1.0).drop("reading_score").unwrap();

    let err = TrainingPipeline::new(config).run_on(&train, &test).unwrap_err();
    assert!(matches!(err.root(), ScorecastError::DataError(_)));
    assert!(err.to_string().starts_with("feature transformation"));
}

#[test]
fn test_sequential_and_abort_policy() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::default()
        .with_artifact_dir(dir.path())
        .with_parallel(false)
        .with_failure_policy(FailurePolicy::Abort)
        .with_random_state(7);

    let outcome = TrainingPipeline::new(config)
        .run_on(&student_df(200, 71, 1.0), &student_df(60, 72, 1.0))
        .unwrap();
    assert!(outcome.scores.entries().iter().all(|e| !e.is_failure()));
    assert!(outcome.score >= 0.6);
}

#[test]
fn test_missing_dataset_file() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::new(dir.path().join("nope.csv"), dir.path().join("nope2.csv"))
        .with_artifact_dir(dir.path());
    let err = TrainingPipeline::new(config).run().unwrap_err();
    assert!(matches!(err.root(), ScorecastError::DataError(_)));
}
