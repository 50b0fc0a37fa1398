//! Feature transformation module
//!
//! Turns mixed numeric/categorical tables into a fixed-width numeric matrix:
//! - Numeric columns: median imputation, then standard scaling
//! - Categorical columns: most-frequent imputation, then one-hot encoding
//!
//! Statistics are learned once from training data and reused read-only.

mod column_spec;
mod encoder;
mod imputer;
mod scaler;
mod transformer;

pub use column_spec::{ColumnKind, ColumnSpec};
pub use encoder::OneHotVocabulary;
pub use imputer::{median, most_frequent};
pub use scaler::StandardParams;
pub use transformer::{
    CategoricalColumn, FeatureMatrix, FeatureTransformer, FittedTransformer, NumericColumn,
};

pub(crate) use imputer::is_numeric_dtype;
