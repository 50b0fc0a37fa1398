//! Scorecast CLI Module
//!
//! Command-line interface for training, prediction, and dataset inspection.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::pipeline::{Predictor, TrainingOutcome, TrainingPipeline};
use crate::training::{FailurePolicy, ScoreMap};
use crate::utils::{DataLoader, DataSaver, DatasetInfo};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "scorecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, select and persist a regression model for tabular data")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Isolate,
    Abort,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Isolate => FailurePolicy::Isolate,
            PolicyArg::Abort => FailurePolicy::Abort,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fit the transformer, select a model and persist both
    Train {
        /// JSON pipeline config; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Training data file (CSV or TSV)
        #[arg(long)]
        train: Option<PathBuf>,

        /// Test data file (CSV or TSV)
        #[arg(long)]
        test: Option<PathBuf>,

        /// Directory receiving preprocessor.json and model.json
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Minimum test R² for acceptance
        #[arg(long)]
        min_score: Option<f64>,

        /// Behaviour when a candidate fails to fit or predict
        #[arg(long, value_enum)]
        failure_policy: Option<PolicyArg>,

        /// Only evaluate these candidates (comma separated names)
        #[arg(long, value_delimiter = ',')]
        models: Option<Vec<String>>,

        /// Seed for stochastic candidates
        #[arg(long)]
        seed: Option<u64>,

        /// Evaluate candidates one at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Predict with persisted artifacts
    Predict {
        /// Fitted transformer artifact
        #[arg(short, long, default_value = "artifacts/preprocessor.json")]
        transformer: PathBuf,

        /// Selected model artifact
        #[arg(short, long, default_value = "artifacts/model.json")]
        model: PathBuf,

        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Output predictions file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show data information
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    config_path: Option<&Path>,
    train: Option<PathBuf>,
    test: Option<PathBuf>,
    output: Option<PathBuf>,
    min_score: Option<f64>,
    failure_policy: Option<PolicyArg>,
    models: Option<Vec<String>>,
    seed: Option<u64>,
    sequential: bool,
) -> anyhow::Result<()> {
    section("Train");

    let mut config = match config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(path) = train { config.train_path = path; }
    if let Some(path) = test { config.test_path = path; }
    if let Some(dir) = output { config = config.with_artifact_dir(dir); }
    if let Some(score) = min_score { config.min_score = score; }
    if let Some(policy) = failure_policy { config.failure_policy = policy.into(); }
    if let Some(names) = models { config.models = Some(names); }
    if let Some(seed) = seed { config.random_state = seed; }
    if sequential { config.parallel = false; }

    println!("  {:<16} {}", muted("Train"), config.train_path.display());
    println!("  {:<16} {}", muted("Test"), config.test_path.display());
    println!("  {:<16} {}", muted("Target"), config.columns.target_column);
    println!();

    step_run("Training candidates");
    let start = Instant::now();
    let outcome = TrainingPipeline::new(config).run();
    match &outcome {
        Ok(_) => step_done(&format!("{:.2?}", start.elapsed())),
        Err(_) => println!("{}", "failed".red()),
    }
    let outcome = outcome?;

    print_leaderboard(&outcome.scores, &outcome.model_name);
    print_outcome(&outcome);
    Ok(())
}

fn print_leaderboard(scores: &ScoreMap, selected: &str) {
    section("Leaderboard");
    println!(
        "  {:<24} {:>10} {:>10} {:>10} {:>9}",
        muted("Model"), muted("R²"), muted("RMSE"), muted("MAE"), muted("Time")
    );
    println!("  {}", dim(&"─".repeat(67)));

    for entry in scores.entries() {
        let marker = if entry.name == selected { ok("●") } else { dim(" ") };
        match (&entry.failure, &entry.metrics) {
            (Some(reason), _) => {
                println!(" {} {:<24} {}", marker, entry.name, format!("err: {}", reason).red());
            }
            (None, Some(m)) => {
                println!(
                    " {} {:<24} {:>10.4} {:>10.4} {:>10.4} {:>8.2}s",
                    marker, entry.name, entry.score, m.rmse, m.mae, entry.fit_time_secs
                );
            }
            (None, None) => {
                println!(" {} {:<24} {:>10.4}", marker, entry.name, entry.score);
            }
        }
    }
    println!("  {}", dim(&"─".repeat(67)));
}

fn print_outcome(outcome: &TrainingOutcome) {
    println!();
    println!(
        "  {} {} {} {:.4}",
        ok("best"),
        outcome.model_name.as_str().white().bold(),
        muted("R²:"),
        outcome.score
    );
    println!("  {:<16} {}", muted("Preprocessor"), outcome.transformer_path.display());
    println!("  {:<16} {}", muted("Model"), outcome.model_path.display());
    println!();
}

pub fn cmd_predict(
    transformer_path: &Path,
    model_path: &Path,
    data_path: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading artifacts");
    let predictor = Predictor::load(transformer_path, model_path)?;
    step_done(&format!("{} ({})", predictor.model_name(), predictor.family()));

    step_run("Loading data");
    let df = DataLoader::new().load_auto(data_path)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    step_run("Predicting");
    let start = Instant::now();
    let predictions = predictor.predict(&df)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    match output {
        Some(path) => {
            let mut out = df!("prediction" => predictions.to_vec())?;
            DataSaver::save_csv(&mut out, path)?;
            println!("  {:<16} {}", muted("Saved"), path.display());
        }
        None => {
            println!();
            for (i, p) in predictions.iter().enumerate() {
                println!("  {:>6} {:.4}", dim(&i.to_string()), p);
            }
        }
    }

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load_auto(data_path)?;
    let info = DatasetInfo::from_frame(&df);

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), info.n_rows);
    println!("  {:<12} {}", muted("Columns"), info.n_cols);
    println!();

    println!("  {:<32} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(52)));

    for col in &info.columns {
        println!(
            "  {:<32} {:<12} {:>6}",
            col.name,
            col.dtype.as_str().truecolor(140, 140, 140),
            col.null_count
        );
    }

    println!();
    Ok(())
}
