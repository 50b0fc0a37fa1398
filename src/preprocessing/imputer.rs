//! Missing value imputation

use crate::error::{Result, ScorecastError};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Check if dtype is numeric
pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn lookup<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| ScorecastError::DataError(format!("column '{}' not found in dataset", name)))
}

/// Read a numeric column as optional f64 values. NaN counts as missing.
pub(crate) fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = lookup(df, name)?;

    if !is_numeric_dtype(series.dtype()) {
        return Err(ScorecastError::DataError(format!(
            "column '{}' is declared numeric but has type {}",
            name,
            series.dtype()
        )));
    }

    let casted = series.cast(&DataType::Float64)?;
    let values = casted
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();

    Ok(values)
}

/// Declared type of a column, rendered the way polars prints it
pub(crate) fn column_dtype(df: &DataFrame, name: &str) -> Result<String> {
    Ok(lookup(df, name)?.dtype().to_string())
}

/// Read a categorical column as optional strings
pub(crate) fn categorical_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = lookup(df, name)?;

    let casted = series.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();

    Ok(values)
}

/// Median of the observed values; `None` when nothing was observed
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.is_empty() {
        return None;
    }
    observed.sort_by(|a, b| a.total_cmp(b));

    let mid = observed.len() / 2;
    if observed.len() % 2 == 0 {
        Some((observed[mid - 1] + observed[mid]) / 2.0)
    } else {
        Some(observed[mid])
    }
}

/// Most frequent observed value. Ties go to the lexicographically smallest value.
pub fn most_frequent(values: &[Option<String>]) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        match best {
            Some((_, c)) if c >= count => {}
            _ => best = Some((value, count)),
        }
    }

    best.map(|(v, _)| v.to_string())
}

/// Fill missing numeric values with a constant
pub fn fill_numeric(values: &[Option<f64>], fill: f64) -> Vec<f64> {
    values.iter().map(|v| v.unwrap_or(fill)).collect()
}
