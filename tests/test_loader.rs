//! Integration test: SQL loader and synthetic fallback

use liver_risk::data::synthetic::{generate, SyntheticConfig};
use liver_risk::data::{
    feature_columns, load_data_from_sql, render_sql_script, DataSource, TARGET,
};
use liver_risk::RiskError;
use polars::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_script(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn expected_columns() -> Vec<String> {
    let mut cols: Vec<String> = feature_columns().iter().map(|s| s.to_string()).collect();
    cols.push(TARGET.to_string());
    cols
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_missing_file_is_config_error() {
    let err = load_data_from_sql("/definitely/not/here.sql").await.unwrap_err();
    assert!(matches!(err, RiskError::ConfigError(_)));
    assert!(err.to_string().contains("/definitely/not/here.sql"));
}

#[tokio::test]
async fn test_generated_script_round_trips() {
    let dir = TempDir::new().unwrap();
    let df = generate(&SyntheticConfig::new().with_samples(25)).unwrap();
    let path = write_script(&dir, "data.sql", &render_sql_script(&df).unwrap());

    let loaded = load_data_from_sql(&path).await.unwrap();
    match &loaded.source {
        DataSource::Script { rows, skipped, .. } => {
            assert_eq!(*rows, 25);
            assert_eq!(*skipped, 0);
        }
        other => panic!("expected script source, got {:?}", other),
    }
    assert_eq!(column_names(&loaded.frame), expected_columns());

    for name in ["gender", "smoking_status", "hepatitis_c", TARGET] {
        assert!(
            loaded.frame.column(name).unwrap().as_materialized_series().equals(df.column(name).unwrap().as_materialized_series()),
            "column {} differs",
            name
        );
    }
    let generated = df.column("bmi").unwrap().as_materialized_series().f64().unwrap().clone();
    let restored = loaded.frame.column("bmi").unwrap().as_materialized_series().f64().unwrap().clone();
    for (a, b) in generated.into_no_null_iter().zip(restored.into_no_null_iter()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_malformed_script_falls_back() {
    let dir = TempDir::new().unwrap();
    let path = write_script(&dir, "broken.sql", "THIS IS NOT SQL; NOR IS THIS;");

    let loaded = load_data_from_sql(&path).await.unwrap();
    assert!(loaded.source.is_synthetic());
    assert_eq!(loaded.frame.height(), 1000);
    assert_eq!(column_names(&loaded.frame), expected_columns());
}

#[tokio::test]
async fn test_wrong_table_falls_back() {
    let dir = TempDir::new().unwrap();
    let path = write_script(
        &dir,
        "other.sql",
        "CREATE TABLE patients (id INTEGER); INSERT INTO patients VALUES (1);",
    );

    let loaded = load_data_from_sql(&path).await.unwrap();
    match loaded.source {
        DataSource::Synthetic { reason } => assert!(reason.contains("mytable")),
        other => panic!("expected synthetic source, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_table_falls_back() {
    let dir = TempDir::new().unwrap();
    let df = generate(&SyntheticConfig::new().with_samples(1)).unwrap();
    let script = render_sql_script(&df).unwrap();
    let create_only = script.lines().take_while(|l| !l.starts_with("INSERT")).collect::<Vec<_>>().join("\n");
    let path = write_script(&dir, "empty.sql", &create_only);

    let loaded = load_data_from_sql(&path).await.unwrap();
    assert!(loaded.source.is_synthetic());
    assert!(loaded.frame.height() > 0);
}

#[tokio::test]
async fn test_duplicate_key_insert_is_skipped() {
    let dir = TempDir::new().unwrap();
    let df = generate(&SyntheticConfig::new().with_samples(3)).unwrap();
    let script = render_sql_script(&df).unwrap();

    // Repeat the first INSERT; its primary key collides
    let first_insert = script.lines().find(|l| l.starts_with("INSERT")).unwrap().to_string();
    let path = write_script(&dir, "dupes.sql", &format!("{}\n{}\n", script, first_insert));

    let loaded = load_data_from_sql(&path).await.unwrap();
    match loaded.source {
        DataSource::Script { rows, skipped, .. } => {
            assert_eq!(rows, 3);
            assert_eq!(skipped, 1);
        }
        other => panic!("expected script source, got {:?}", other),
    }
}

/// One-row script where `null_column` holds NULL
fn script_with_null(null_column: &str) -> String {
    let cells = [
        ("age", "50"),
        ("gender", "'Male'"),
        ("bmi", "24.5"),
        ("alcohol_consumption", "'None'"),
        ("smoking_status", "'Never'"),
        ("hepatitis_b", "0"),
        ("hepatitis_c", "0"),
        ("liver_function_score", "50"),
        ("alpha_fetoprotein_level", "5"),
        ("cirrhosis_history", "0"),
        ("family_history_cancer", "0"),
        ("physical_activity_level", "'Low'"),
        ("diabetes", "0"),
        ("liver_cancer", "0"),
    ];
    let columns: Vec<&str> = cells.iter().map(|(c, _)| *c).collect();
    let values: Vec<&str> = cells
        .iter()
        .map(|(c, v)| if *c == null_column { "NULL" } else { *v })
        .collect();
    format!(
        "CREATE TABLE mytable ({});\nINSERT INTO mytable ({}) VALUES ({});",
        columns.join(", "),
        columns.join(", "),
        values.join(", ")
    )
}

#[tokio::test]
async fn test_null_cell_falls_back() {
    let dir = TempDir::new().unwrap();

    // REAL, TEXT and INTEGER columns
    for column in ["bmi", "physical_activity_level", "hepatitis_c"] {
        let path = write_script(&dir, &format!("null_{}.sql", column), &script_with_null(column));
        let loaded = load_data_from_sql(&path).await.unwrap();
        match loaded.source {
            DataSource::Synthetic { reason } => {
                assert!(reason.contains(column), "{}: {}", column, reason);
                assert!(reason.contains("NULL"), "{}: {}", column, reason);
            }
            other => panic!("{}: expected synthetic source, got {:?}", column, other),
        }
        assert_eq!(loaded.frame.height(), 1000);
    }
}

#[tokio::test]
async fn test_script_without_nulls_loads() {
    let dir = TempDir::new().unwrap();
    let path = write_script(&dir, "clean.sql", &script_with_null("none"));

    let loaded = load_data_from_sql(&path).await.unwrap();
    assert!(!loaded.source.is_synthetic());
    let bmi = loaded.frame.column("bmi").unwrap().as_materialized_series().f64().unwrap().get(0);
    assert_eq!(bmi, Some(24.5));
}

#[tokio::test]
async fn test_fallback_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let path = write_script(&dir, "broken.sql", "garbage");

    let a = load_data_from_sql(&path).await.unwrap();
    let b = load_data_from_sql(&path).await.unwrap();
    assert!(a.frame.equals(&b.frame));
}
