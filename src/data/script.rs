//! Render a dataset as the SQL script the loader consumes

use std::fmt::Write as _;

use polars::prelude::*;

use super::{BINARY_FEATURES, CATEGORICAL_FEATURES, NUMERIC_FEATURES, SOURCE_TABLE, TARGET};
use crate::error::{Result, RiskError};

/// Produce `CREATE TABLE mytable` followed by one `INSERT` per row.
///
/// The frame must carry the canonical schema including the label column.
pub fn render_sql_script(df: &DataFrame) -> Result<String> {
    let integer_cols: Vec<&str> = BINARY_FEATURES
        .iter()
        .copied()
        .chain(std::iter::once(TARGET))
        .collect();

    let numeric: Vec<Float64Chunked> = NUMERIC_FEATURES
        .iter()
        .map(|name| float_column(df, name))
        .collect::<Result<_>>()?;
    let text: Vec<StringChunked> = CATEGORICAL_FEATURES
        .iter()
        .map(|name| string_column(df, name))
        .collect::<Result<_>>()?;
    let integer: Vec<Int64Chunked> = integer_cols
        .iter()
        .map(|name| int_column(df, name))
        .collect::<Result<_>>()?;

    let column_list: Vec<&str> = NUMERIC_FEATURES
        .iter()
        .chain(CATEGORICAL_FEATURES.iter())
        .copied()
        .chain(integer_cols.iter().copied())
        .collect();

    let mut out = String::new();
    let mut definitions: Vec<String> = Vec::new();
    definitions.extend(NUMERIC_FEATURES.iter().map(|c| format!("  {} REAL NOT NULL", c)));
    definitions.extend(CATEGORICAL_FEATURES.iter().map(|c| format!("  {} TEXT NOT NULL", c)));
    definitions.extend(integer_cols.iter().map(|c| format!("  {} INTEGER NOT NULL", c)));

    // writeln! into a String cannot fail
    let _ = writeln!(
        out,
        "CREATE TABLE {} (\n  id INTEGER PRIMARY KEY,\n{}\n);",
        SOURCE_TABLE,
        definitions.join(",\n")
    );

    for row in 0..df.height() {
        let mut values: Vec<String> = Vec::with_capacity(column_list.len() + 1);
        values.push((row + 1).to_string());

        for (ca, name) in numeric.iter().zip(NUMERIC_FEATURES.iter()) {
            let v = ca.get(row).ok_or_else(|| null_cell(name, row))?;
            values.push(format_real(v));
        }
        for (ca, name) in text.iter().zip(CATEGORICAL_FEATURES.iter()) {
            let v = ca.get(row).ok_or_else(|| null_cell(name, row))?;
            values.push(format!("'{}'", v.replace('\'', "''")));
        }
        for (ca, name) in integer.iter().zip(integer_cols.iter()) {
            let v = ca.get(row).ok_or_else(|| null_cell(name, row))?;
            values.push(v.to_string());
        }

        let _ = writeln!(
            out,
            "INSERT INTO {} (id, {}) VALUES ({});",
            SOURCE_TABLE,
            column_list.join(", "),
            values.join(", ")
        );
    }

    Ok(out)
}

fn format_real(v: f64) -> String {
    // Debug keeps a decimal point and round-trips exactly
    format!("{:?}", v)
}

fn null_cell(column: &str, row: usize) -> RiskError {
    RiskError::InvalidInput(format!("null value in column '{}' at row {}", column, row))
}

fn float_column(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df
        .column(name)
        .map_err(|_| RiskError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.clone())
}

fn string_column(df: &DataFrame, name: &str) -> Result<StringChunked> {
    let column = df
        .column(name)
        .map_err(|_| RiskError::FeatureNotFound(name.to_string()))?;
    Ok(column.as_materialized_series().str()?.clone())
}

fn int_column(df: &DataFrame, name: &str) -> Result<Int64Chunked> {
    let column = df
        .column(name)
        .map_err(|_| RiskError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Int64)?;
    Ok(series.i64()?.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{generate, SyntheticConfig};

    #[test]
    fn test_render_small_dataset() {
        let df = generate(&SyntheticConfig::new().with_samples(3)).unwrap();
        let script = render_sql_script(&df).unwrap();

        assert!(script.starts_with("CREATE TABLE mytable ("));
        assert_eq!(script.matches("INSERT INTO mytable").count(), 3);
        assert!(script.contains("liver_cancer INTEGER NOT NULL"));
    }

    #[test]
    fn test_quotes_are_escaped() {
        let df = generate(&SyntheticConfig::new().with_samples(1)).unwrap();
        let mut df = df;
        df.replace("gender", Series::new("gender".into(), vec!["O'Brien".to_string()]))
            .unwrap();
        let script = render_sql_script(&df).unwrap();
        assert!(script.contains("'O''Brien'"));
    }

    #[test]
    fn test_missing_label_rejected() {
        let df = generate(&SyntheticConfig::new().with_samples(2)).unwrap();
        let df = df.drop(TARGET).unwrap();
        let err = render_sql_script(&df).unwrap_err();
        assert!(matches!(err, RiskError::FeatureNotFound(_)));
    }

    #[test]
    fn test_format_real_keeps_decimal_point() {
        assert_eq!(format_real(30.0), "30.0");
        assert_eq!(format_real(0.1), "0.1");
    }
}
