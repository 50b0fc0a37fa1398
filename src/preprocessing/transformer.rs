//! Column-routed feature transformer
//!
//! Two-phase contract: a [`FeatureTransformer`] only knows its routing and
//! can do nothing but [`FeatureTransformer::fit`]. Fitting consumes it and
//! yields a read-only [`FittedTransformer`], the only type that can `apply`.

use super::column_spec::ColumnSpec;
use super::encoder::OneHotVocabulary;
use super::imputer::{categorical_values, column_dtype, fill_numeric, median, most_frequent, numeric_values};
use super::scaler::StandardParams;
use crate::error::{Result, ScorecastError};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Numeric feature matrix with its aligned target vector
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub features: Array2<f64>,
    pub targets: Array1<f64>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }
}

/// Unfit transformer: column routing only
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    spec: ColumnSpec,
}

/// Statistics learned for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    /// Fill value for missing entries
    pub median: f64,
    pub scaler: StandardParams,
}

/// Statistics learned for one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    /// Column type seen at fit time; categories are matched on its string form
    pub dtype: String,
    /// Fill value for missing entries
    pub mode: String,
    pub vocabulary: OneHotVocabulary,
}

/// Transformer fitted on a training dataset. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransformer {
    spec: ColumnSpec,
    numeric: Vec<NumericColumn>,
    categorical: Vec<CategoricalColumn>,
    n_features: usize,
    n_samples_seen: usize,
}

impl FeatureTransformer {
    /// Construct an unfit transformer routed by `spec`
    pub fn build(spec: ColumnSpec) -> Result<Self> {
        spec.validate()?;
        info!(
            numeric = ?spec.numeric_columns,
            categorical = ?spec.categorical_columns,
            target = %spec.target_column,
            "Built feature transformer"
        );
        Ok(Self { spec })
    }

    pub fn spec(&self) -> &ColumnSpec {
        &self.spec
    }

    /// Learn imputation, scaling and encoding statistics from training data only
    pub fn fit(self, df: &DataFrame) -> Result<FittedTransformer> {
        let start = Instant::now();

        if df.height() == 0 {
            return Err(ScorecastError::DataError(
                "cannot fit transformer on an empty dataset".to_string(),
            ));
        }

        let numeric = first_error(
            self.spec
                .numeric_columns
                .par_iter()
                .map(|name| fit_numeric(df, name))
                .collect(),
        )?;

        let categorical = first_error(
            self.spec
                .categorical_columns
                .par_iter()
                .map(|name| fit_categorical(df, name))
                .collect(),
        )?;

        let n_features = numeric.len() + categorical.iter().map(|c| c.vocabulary.len()).sum::<usize>();

        info!(
            rows = df.height(),
            n_features,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fitted feature transformer"
        );

        Ok(FittedTransformer {
            spec: self.spec,
            numeric,
            categorical,
            n_features,
            n_samples_seen: df.height(),
        })
    }
}

/// Column results arrive in column order; report the earliest failure
fn first_error<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    results.into_iter().collect()
}

fn fit_numeric(df: &DataFrame, name: &str) -> Result<NumericColumn> {
    let values = numeric_values(df, name)?;
    let median = median(&values).ok_or_else(|| {
        ScorecastError::DataError(format!("numeric column '{}' has no observed values", name))
    })?;

    // Scaling statistics are taken after imputation
    let filled = fill_numeric(&values, median);
    let scaler = StandardParams::fit(name, &filled)?;

    debug!(column = name, median, mean = scaler.center, std = scaler.scale, "Numeric column fitted");

    Ok(NumericColumn {
        name: name.to_string(),
        median,
        scaler,
    })
}

fn fit_categorical(df: &DataFrame, name: &str) -> Result<CategoricalColumn> {
    let dtype = column_dtype(df, name)?;
    let values = categorical_values(df, name)?;
    let mode = most_frequent(&values).ok_or_else(|| {
        ScorecastError::DataError(format!("categorical column '{}' has no observed values", name))
    })?;

    let vocabulary = OneHotVocabulary::fit(
        values
            .iter()
            .map(|v| v.as_deref().unwrap_or(mode.as_str())),
    );

    debug!(column = name, dtype = %dtype, mode = %mode, categories = vocabulary.len(), "Categorical column fitted");

    Ok(CategoricalColumn {
        name: name.to_string(),
        dtype,
        mode,
        vocabulary,
    })
}

impl FittedTransformer {
    pub fn spec(&self) -> &ColumnSpec {
        &self.spec
    }

    /// Width of the produced feature matrix
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of rows the transformer was fitted on
    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    pub fn numeric_columns(&self) -> &[NumericColumn] {
        &self.numeric
    }

    pub fn categorical_columns(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// Output column names in matrix order, e.g. `lunch_standard`
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|c| c.name.clone()).collect();
        for col in &self.categorical {
            for category in col.vocabulary.categories() {
                names.push(format!("{}_{}", col.name, category));
            }
        }
        names
    }

    /// Transform features and extract the aligned target column
    pub fn apply(&self, df: &DataFrame) -> Result<FeatureMatrix> {
        let features = self.transform(df)?;
        let targets = self.extract_targets(df)?;
        Ok(FeatureMatrix { features, targets })
    }

    /// Transform feature columns only (the target may be absent)
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let n_rows = df.height();

        let numeric_blocks = first_error(
            self.numeric
                .par_iter()
                .map(|col| -> Result<Vec<f64>> {
                    let values = numeric_values(df, &col.name)?;
                    Ok(values
                        .into_iter()
                        .map(|v| col.scaler.transform(v.unwrap_or(col.median)))
                        .collect())
                })
                .collect(),
        )?;

        // Row-major blocks, one per categorical column
        let categorical_blocks = first_error(
            self.categorical
                .par_iter()
                .map(|col| -> Result<(usize, Vec<f64>)> {
                    // "1" and "1.0" are different categories
                    let dtype = column_dtype(df, &col.name)?;
                    if dtype != col.dtype {
                        return Err(ScorecastError::DataError(format!(
                            "categorical column '{}' was fitted as {} but has type {}",
                            col.name, col.dtype, dtype
                        )));
                    }
                    let values = categorical_values(df, &col.name)?;
                    let width = col.vocabulary.len();
                    let mut block = vec![0.0; n_rows * width];
                    for (row, value) in values.iter().enumerate() {
                        let value = value.as_deref().unwrap_or(col.mode.as_str());
                        col.vocabulary
                            .encode_into(value, &mut block[row * width..(row + 1) * width]);
                    }
                    Ok((width, block))
                })
                .collect(),
        )?;

        let mut out = Array2::zeros((n_rows, self.n_features));

        for (j, values) in numeric_blocks.iter().enumerate() {
            for (i, &v) in values.iter().enumerate() {
                out[[i, j]] = v;
            }
        }

        let mut offset = self.numeric.len();
        for (width, block) in &categorical_blocks {
            for i in 0..n_rows {
                for k in 0..*width {
                    out[[i, offset + k]] = block[i * width + k];
                }
            }
            offset += width;
        }

        debug!(rows = n_rows, cols = self.n_features, "Applied feature transformer");
        Ok(out)
    }

    fn extract_targets(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let target = &self.spec.target_column;
        let values = numeric_values(df, target)?;

        let targets = values
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| {
                    ScorecastError::DataError(format!(
                        "target column '{}' is missing a value at row {}",
                        target, row
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(Array1::from_vec(targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ColumnSpec {
        ColumnSpec::new(["x"], ["color"], "y")
    }

    fn train_df() -> DataFrame {
        df!(
            "x" => &[Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)],
            "color" => &[Some("red"), Some("blue"), Some("red"), None, Some("green")],
            "y" => &[10.0, 20.0, 30.0, 40.0, 50.0]
        )
        .unwrap()
    }

    #[test]
    fn test_fit_statistics() {
        let fitted = FeatureTransformer::build(spec()).unwrap().fit(&train_df()).unwrap();

        let num = &fitted.numeric_columns()[0];
        assert_eq!(num.median, 3.0);
        // imputed column: 1, 2, 3, 4, 5
        assert!((num.scaler.center - 3.0).abs() < 1e-12);
        assert!((num.scaler.scale - 2.0_f64.sqrt()).abs() < 1e-12);

        let cat = &fitted.categorical_columns()[0];
        assert_eq!(cat.mode, "red");
        assert_eq!(cat.vocabulary.categories(), &["blue", "green", "red"]);
        assert_eq!(fitted.n_features(), 4);
        assert_eq!(
            fitted.feature_names(),
            vec!["x", "color_blue", "color_green", "color_red"]
        );
    }

    #[test]
    fn test_apply_layout() {
        let fitted = FeatureTransformer::build(spec()).unwrap().fit(&train_df()).unwrap();
        let matrix = fitted.apply(&train_df()).unwrap();

        assert_eq!(matrix.n_rows(), 5);
        assert_eq!(matrix.n_features(), 4);
        assert_eq!(matrix.targets.to_vec(), vec![10.0, 20.0, 30.0, 40.0, 50.0]);

        // Missing x imputed with the median, which scales to zero
        assert!(matrix.features[[2, 0]].abs() < 1e-12);
        // Missing color imputed with "red"
        assert_eq!(matrix.features.row(3).to_vec()[1..], [0.0, 0.0, 1.0]);
        assert_eq!(matrix.features.row(1).to_vec()[1..], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_variance_rejected() {
        let df = df!(
            "x" => &[2.0, 2.0, 2.0],
            "color" => &["a", "b", "c"],
            "y" => &[1.0, 2.0, 3.0]
        )
        .unwrap();
        let err = FeatureTransformer::build(spec()).unwrap().fit(&df).unwrap_err();
        assert!(matches!(err, ScorecastError::DataError(_)));
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let df = df!(
            "x" => Vec::<f64>::new(),
            "color" => Vec::<&str>::new(),
            "y" => Vec::<f64>::new()
        )
        .unwrap();
        assert!(FeatureTransformer::build(spec()).unwrap().fit(&df).is_err());
    }

    #[test]
    fn test_transform_without_target() {
        let fitted = FeatureTransformer::build(spec()).unwrap().fit(&train_df()).unwrap();
        let df = df!("x" => &[3.0], "color" => &["purple"]).unwrap();

        let features = fitted.transform(&df).unwrap();
        assert_eq!(features.row(0).to_vec(), vec![0.0, 0.0, 0.0, 0.0]);
        assert!(fitted.apply(&df).is_err());
    }

    #[test]
    fn test_categorical_type_change_rejected() {
        let spec = ColumnSpec::new(["x"], ["code"], "y");
        let train = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0],
            "code" => &[1i64, 2, 1, 2],
            "y" => &[1.0, 2.0, 3.0, 4.0]
        )
        .unwrap();
        let fitted = FeatureTransformer::build(spec).unwrap().fit(&train).unwrap();
        assert_eq!(fitted.feature_names(), vec!["x", "code_1", "code_2"]);

        let same = df!("x" => &[1.0, 2.0], "code" => &[1i64, 2]).unwrap();
        assert_eq!(fitted.transform(&same).unwrap().column(1).to_vec(), vec![1.0, 0.0]);

        let floats = df!("x" => &[1.0, 2.0], "code" => &[1.0, 2.0]).unwrap();
        let err = fitted.transform(&floats).unwrap_err();
        assert!(matches!(err, ScorecastError::DataError(_)));
        assert!(err.to_string().contains("code"));
    }

    #[test]
    fn test_first_missing_column_reported() {
        let spec = ColumnSpec::new(["a", "b", "c", "d"], ["e", "f"], "y");
        let df = df!("y" => &[1.0, 2.0]).unwrap();
        for _ in 0..20 {
            let err = FeatureTransformer::build(spec.clone()).unwrap().fit(&df).unwrap_err();
            assert!(err.to_string().contains("'a'"), "{}", err);
        }

        let fitted = FeatureTransformer::build(spec.clone())
            .unwrap()
            .fit(&df!(
                "a" => &[1.0, 2.0],
                "b" => &[1.0, 3.0],
                "c" => &[2.0, 5.0],
                "d" => &[0.0, 1.0],
                "e" => &["p", "q"],
                "f" => &["r", "s"],
                "y" => &[1.0, 2.0]
            )
            .unwrap())
            .unwrap();
        let partial = df!("a" => &[1.0], "e" => &["p"]).unwrap();
        for _ in 0..20 {
            let err = fitted.transform(&partial).unwrap_err();
            assert!(err.to_string().contains("'b'"), "{}", err);
        }
    }

    #[test]
    fn test_missing_target_value_rejected() {
        let fitted = FeatureTransformer::build(spec()).unwrap().fit(&train_df()).unwrap();
        let df = df!(
            "x" => &[1.0, 2.0],
            "color" => &["red", "blue"],
            "y" => &[Some(1.0), None]
        )
        .unwrap();
        assert!(matches!(fitted.apply(&df), Err(ScorecastError::DataError(_))));
    }
}
