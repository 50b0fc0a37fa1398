//! Integration test: feature transformation on the student performance schema

use polars::prelude::*;
use rand::prelude::*;
use rand::rngs::StdRng;
use scorecast::preprocessing::{ColumnSpec, FeatureTransformer};
use scorecast::ScorecastError;

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

fn student_df(n: usize, seed: u64) -> DataFrame {
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
        let r: f64 = rng.gen_range(30.0..100.0);
        let w: f64 = r + rng.gen_range(-8.0..8.0);

        gender.push(g);
        race.push(GROUPS[rng.gen_range(0..GROUPS.len())]);
        education.push(EDUCATION[rng.gen_range(0..EDUCATION.len())]);
        lunch.push(l);
        prep.push(PREP[rng.gen_range(0..PREP.len())]);
        reading.push(r);
        writing.push(w);
        let gender_effect = if g == "male" { 5.0 } else { -2.0 };
        let lunch_effect = if l == "standard" { 4.0 } else { -4.0 };
        math.push(0.5 * r + 0.4 * w + gender_effect + lunch_effect);
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

#[test]
fn test_student_schema_width_and_order() {
    let train = student_df(200, 1);
    let fitted = FeatureTransformer::build(ColumnSpec::student_performance())
        .unwrap()
        .fit(&train)
        .unwrap();

    // 2 numeric + 2 + 5 + 6 + 2 + 2 indicator columns
    assert_eq!(fitted.n_features(), 19);

    let names = fitted.feature_names();
    assert_eq!(names[0], "reading_score");
    assert_eq!(names[1], "writing_score");
    assert_eq!(names[2], "gender_female");
    assert_eq!(names[3], "gender_male");
    assert_eq!(names[4], "race_ethnicity_group A");
    assert_eq!(names[18], "test_preparation_course_none");
}

#[test]
fn test_apply_is_idempotent() {
    let train = student_df(120, 2);
    let test = student_df(40, 3);
    let fitted = FeatureTransformer::build(ColumnSpec::student_performance())
        .unwrap()
        .fit(&train)
        .unwrap();

    let first = fitted.apply(&test).unwrap();
    let second = fitted.apply(&test).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.n_rows(), 40);
    assert_eq!(first.targets.len(), 40);
}

#[test]
fn test_statistics_come_from_fit_data_only() {
    let train = student_df(100, 4);
    let fitted = FeatureTransformer::build(ColumnSpec::student_performance())
        .unwrap()
        .fit(&train)
        .unwrap();

    let reading: Vec<f64> = train
        .column("reading_score")
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    let mean = reading.iter().sum::<f64>() / reading.len() as f64;

    let stats = &fitted.numeric_columns()[0];
    assert_eq!(stats.name, "reading_score");
    assert!((stats.scaler.center - mean).abs() < 1e-9);

    // Applying to a very different table leaves the learned statistics alone
    let mut shifted = train.clone();
    let bumped: Vec<f64> = reading.iter().map(|r| r + 500.0).collect();
    shifted
        .with_column(Series::new("reading_score".into(), bumped))
        .unwrap();
    let matrix = fitted.apply(&shifted).unwrap();
    assert!((fitted.numeric_columns()[0].scaler.center - mean).abs() < 1e-9);
    assert!(matrix.features.column(0).iter().all(|&v| v > 5.0));
}

#[test]
fn test_unseen_category_encodes_to_zeros() {
    let train = student_df(100, 5);
    let fitted = FeatureTransformer::build(ColumnSpec::student_performance())
        .unwrap()
        .fit(&train)
        .unwrap();

    let row = df!(
        "gender" => &["nonbinary"],
        "race_ethnicity" => &["group A"],
        "parental_level_of_education" => &["doctorate"],
        "lunch" => &["standard"],
        "test_preparation_course" => &["none"],
        "reading_score" => &[70.0],
        "writing_score" => &[72.0]
    )
    .unwrap();

    let features = fitted.transform(&row).unwrap();
    let names = fitted.feature_names();
    for (j, name) in names.iter().enumerate() {
        if name.starts_with("gender_") || name.starts_with("parental_level_of_education_") {
            assert_eq!(features[[0, j]], 0.0, "{} should be zero", name);
        }
    }
    let group_a = names.iter().position(|n| n == "race_ethnicity_group A").unwrap();
    assert_eq!(features[[0, group_a]], 1.0);
}

#[test]
fn test_column_order_independent_of_row_order() {
    let train = student_df(150, 6);
    let spec = ColumnSpec::student_performance();

    let a = FeatureTransformer::build(spec.clone()).unwrap().fit(&train).unwrap();
    let b = FeatureTransformer::build(spec).unwrap().fit(&train.reverse()).unwrap();
    assert_eq!(a.feature_names(), b.feature_names());
}

#[test]
fn test_missing_numeric_column_is_data_error() {
    let train = student_df(50, 7).drop("writing_score").unwrap();
    let err = FeatureTransformer::build(ColumnSpec::student_performance())
        .unwrap()
        .fit(&train)
        .unwrap_err();
    assert!(matches!(err, ScorecastError::DataError(_)));
}

#[test]
fn test_invalid_specs_are_config_errors() {
    let overlap = ColumnSpec::new(["a", "b"], ["b"], "y");
    assert!(matches!(
        FeatureTransformer::build(overlap),
        Err(ScorecastError::ConfigError(_))
    ));

    let empty = ColumnSpec::new(Vec::<String>::new(), Vec::<String>::new(), "y");
    assert!(matches!(
        FeatureTransformer::build(empty),
        Err(ScorecastError::ConfigError(_))
    ));

    let target_as_feature = ColumnSpec::new(["math_score"], ["gender"], "math_score");
    assert!(matches!(
        FeatureTransformer::build(target_as_feature),
        Err(ScorecastError::ConfigError(_))
    ));
}

#[test]
fn test_transformer_serde_round_trip() {
    let fitted = FeatureTransformer::build(ColumnSpec::student_performance())
        .unwrap()
        .fit(&student_df(80, 8))
        .unwrap();

    let json = serde_json::to_string(&fitted).unwrap();
    let restored: scorecast::preprocessing::FittedTransformer = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, fitted);

    let test = student_df(20, 9);
    assert_eq!(restored.apply(&test).unwrap(), fitted.apply(&test).unwrap());
}
