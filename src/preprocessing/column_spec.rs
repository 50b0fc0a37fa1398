//! Column routing declaration

use crate::error::{Result, ScorecastError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a feature column is routed through the transformer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Declares which columns are numeric, which are categorical, and the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Numeric feature columns, in output order
    pub numeric_columns: Vec<String>,
    /// Categorical feature columns, in output order
    pub categorical_columns: Vec<String>,
    /// Column holding the regression target
    pub target_column: String,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self::student_performance()
    }
}

impl ColumnSpec {
    /// Create a new column specification
    pub fn new<N, C, S>(numeric: N, categorical: C, target: impl Into<String>) -> Self
    where
        N: IntoIterator<Item = S>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            numeric_columns: numeric.into_iter().map(Into::into).collect(),
            categorical_columns: categorical.into_iter().map(Into::into).collect(),
            target_column: target.into(),
        }
    }

    /// Schema of the student performance dataset
    pub fn student_performance() -> Self {
        Self::new(
            ["reading_score", "writing_score"],
            [
                "gender",
                "race_ethnicity",
                "parental_level_of_education",
                "lunch",
                "test_preparation_course",
            ],
            "math_score",
        )
    }

    /// Check that the two feature sets are disjoint, non-empty as a whole,
    /// free of duplicates, and exclude the target.
    pub fn validate(&self) -> Result<()> {
        if self.numeric_columns.is_empty() && self.categorical_columns.is_empty() {
            return Err(ScorecastError::ConfigError(
                "no feature columns declared: numeric and categorical sets are both empty".to_string(),
            ));
        }

        if self.target_column.trim().is_empty() {
            return Err(ScorecastError::ConfigError("target column name is empty".to_string()));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for name in &self.numeric_columns {
            if name.trim().is_empty() {
                return Err(ScorecastError::ConfigError("empty numeric column name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ScorecastError::ConfigError(format!(
                    "numeric column '{}' declared more than once",
                    name
                )));
            }
        }

        for name in &self.categorical_columns {
            if name.trim().is_empty() {
                return Err(ScorecastError::ConfigError("empty categorical column name".to_string()));
            }
            if self.numeric_columns.iter().any(|n| n == name) {
                return Err(ScorecastError::ConfigError(format!(
                    "column '{}' is declared both numeric and categorical",
                    name
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ScorecastError::ConfigError(format!(
                    "categorical column '{}' declared more than once",
                    name
                )));
            }
        }

        if seen.contains(self.target_column.as_str()) {
            return Err(ScorecastError::ConfigError(format!(
                "target column '{}' must not be a feature column",
                self.target_column
            )));
        }

        Ok(())
    }

    /// All feature columns: numeric first, then categorical
    pub fn feature_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric_columns
            .iter()
            .chain(self.categorical_columns.iter())
            .map(String::as_str)
    }

    /// Routing of a column, if declared as a feature
    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        if self.numeric_columns.iter().any(|c| c == name) {
            Some(ColumnKind::Numeric)
        } else if self.categorical_columns.iter().any(|c| c == name) {
            Some(ColumnKind::Categorical)
        } else {
            None
        }
    }
}
