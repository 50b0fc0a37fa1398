//! Data loading utilities

use crate::error::{Result, ResultExt, ScorecastError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// CSV loader for tabular datasets
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows sampled to infer column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 100,
        }
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a comma-separated file with a header row
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        self.load_csv_with_separator(path, b',')
    }

    /// Load a delimited file with a header row
    pub fn load_csv_with_separator(&self, path: &Path, separator: u8) -> Result<DataFrame> {
        let start = Instant::now();
        if !path.is_file() {
            return Err(ScorecastError::DataError(format!(
                "dataset '{}' does not exist or is not a file",
                path.display()
            )));
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(CsvParseOptions::default().with_separator(separator))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(ScorecastError::from)
            .with_context(|| format!("reading '{}'", path.display()))?;

        info!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded dataset"
        );
        Ok(df)
    }

    /// Detect the separator from the extension (`.tsv` is tab, anything else comma)
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let is_tsv = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("tsv"));
        self.load_csv_with_separator(path, if is_tsv { b'\t' } else { b',' })
    }
}

/// Save DataFrames to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV with a header row, creating parent directories
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(df)
            .map_err(ScorecastError::from)
            .with_context(|| format!("writing '{}'", path.display()))
    }
}

/// Per-column overview of a loaded dataset
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
}

/// Shape and column types of a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnInfo>,
}

impl DatasetInfo {
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|col| ColumnInfo {
                name: col.name().to_string(),
                dtype: col.dtype().to_string(),
                null_count: col.null_count(),
            })
            .collect();

        Self {
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "gender,reading_score,math_score").unwrap();
        writeln!(file, "female,72,70").unwrap();
        writeln!(file, "male,,65").unwrap();
        drop(file);

        let df = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(df.shape(), (2, 3));

        let info = DatasetInfo::from_frame(&df);
        assert_eq!(info.n_rows, 2);
        assert_eq!(info.columns[1].name, "reading_score");
        assert_eq!(info.columns[1].null_count, 1);
    }

    #[test]
    fn test_missing_file() {
        let err = DataLoader::new().load_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, ScorecastError::DataError(_)));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let mut df = df!("prediction" => &[1.5, 2.5]).unwrap();

        DataSaver::save_csv(&mut df, &path).unwrap();
        let loaded = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(loaded.shape(), (2, 1));
    }
}
