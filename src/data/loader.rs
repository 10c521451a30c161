//! SQL-script data loader with synthetic fallback
//!
//! The script is executed statement by statement against a throwaway
//! in-memory SQLite store, then `mytable` is read back into a frame.
//!
//! Failures fall into two classes:
//! - a missing script is a configuration error and is returned to the caller;
//! - anything wrong *inside* the script (bad statements, missing table, bad
//!   rows) is a [`DataIssue`], logged and answered with synthetic data.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use sqlx::error::ErrorKind;
use sqlx::sqlite::SqliteRow;
use sqlx::{Connection, Row, SqliteConnection};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::synthetic::create_synthetic_data;
use super::{BINARY_FEATURES, CATEGORICAL_FEATURES, NUMERIC_FEATURES, SOURCE_TABLE, TARGET};
use crate::error::{Result, RiskError};

/// Default location of the source script
pub const DEFAULT_SQL_FILE: &str = "data/synthetic_liver_cancer_dataset.sql";

/// Recoverable problem with the script contents
#[derive(Debug, Error)]
pub enum DataIssue {
    #[error("script could not be read: {0}")]
    Unreadable(String),

    #[error("in-memory store unavailable: {0}")]
    Store(String),

    #[error("table `{table}` could not be read: {reason}")]
    TableUnavailable { table: String, reason: String },

    #[error("table `{0}` has no rows")]
    EmptyTable(String),

    #[error("row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("frame construction failed: {0}")]
    Frame(String),
}

/// Where a loaded dataset came from
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// Rows read from `mytable` after running the script
    Script {
        path: PathBuf,
        rows: usize,
        executed: usize,
        skipped: usize,
    },
    /// Script unusable; deterministic synthetic data instead
    Synthetic { reason: String },
}

impl DataSource {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, DataSource::Synthetic { .. })
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Script { path, rows, skipped, .. } => write!(
                f,
                "{} ({} rows, {} statements skipped)",
                path.display(),
                rows,
                skipped
            ),
            DataSource::Synthetic { reason } => write!(f, "synthetic ({})", reason),
        }
    }
}

/// A dataset plus its provenance
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub frame: DataFrame,
    pub source: DataSource,
}

struct ScriptLoad {
    frame: DataFrame,
    executed: usize,
    skipped: usize,
}

/// Load the training dataset from a SQL script.
///
/// Returns [`RiskError::ConfigError`] if `path` does not exist. Every other
/// failure falls back to [`create_synthetic_data`].
pub async fn load_data_from_sql(path: impl AsRef<Path>) -> Result<LoadedDataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RiskError::ConfigError(format!(
            "SQL file not found: {}. Place the dataset script under data/ or pass --data",
            path.display()
        )));
    }

    match materialize(path).await {
        Ok(load) => {
            let rows = load.frame.height();
            info!(
                path = %path.display(),
                rows,
                executed = load.executed,
                skipped = load.skipped,
                "Loaded dataset from SQL script"
            );
            Ok(LoadedDataset {
                frame: load.frame,
                source: DataSource::Script {
                    path: path.to_path_buf(),
                    rows,
                    executed: load.executed,
                    skipped: load.skipped,
                },
            })
        }
        Err(issue) => {
            warn!(path = %path.display(), reason = %issue, "Falling back to synthetic training data");
            let frame = create_synthetic_data()?;
            Ok(LoadedDataset {
                frame,
                source: DataSource::Synthetic {
                    reason: issue.to_string(),
                },
            })
        }
    }
}

/// Split a script into trimmed, non-empty statements
pub fn split_statements(script: &str) -> Vec<&str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

async fn materialize(path: &Path) -> std::result::Result<ScriptLoad, DataIssue> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DataIssue::Unreadable(e.to_string()))?;
    let script = String::from_utf8(bytes).map_err(|e| DataIssue::Unreadable(e.to_string()))?;

    let mut conn = SqliteConnection::connect("sqlite::memory:")
        .await
        .map_err(|e| DataIssue::Store(e.to_string()))?;

    let (executed, skipped) = run_statements(&mut conn, &script).await;
    let frame = read_source_table(&mut conn).await;

    if let Err(e) = conn.close().await {
        debug!(error = %e, "Closing in-memory store failed");
    }

    Ok(ScriptLoad {
        frame: frame?,
        executed,
        skipped,
    })
}

async fn run_statements(conn: &mut SqliteConnection, script: &str) -> (usize, usize) {
    let mut executed = 0;
    let mut skipped = 0;

    for (idx, statement) in split_statements(script).into_iter().enumerate() {
        match sqlx::query(statement).execute(&mut *conn).await {
            Ok(_) => executed += 1,
            Err(sqlx::Error::Database(db)) if is_integrity_violation(db.kind()) => {
                skipped += 1;
                warn!(statement = idx, error = %db, "Integrity error ignored");
            }
            Err(e) => {
                skipped += 1;
                warn!(statement = idx, error = %e, "SQL statement failed, skipping");
            }
        }
    }

    (executed, skipped)
}

fn is_integrity_violation(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation
    )
}

fn select_query() -> String {
    let mut projections = Vec::new();
    for col in NUMERIC_FEATURES {
        projections.push(format!("CAST({col} AS REAL) AS {col}"));
    }
    for col in CATEGORICAL_FEATURES {
        projections.push(format!("CAST({col} AS TEXT) AS {col}"));
    }
    for col in BINARY_FEATURES.iter().chain(std::iter::once(&TARGET)) {
        projections.push(format!("CAST({col} AS INTEGER) AS {col}"));
    }
    format!("SELECT {} FROM {}", projections.join(", "), SOURCE_TABLE)
}

async fn read_source_table(conn: &mut SqliteConnection) -> std::result::Result<DataFrame, DataIssue> {
    let rows = sqlx::query(&select_query())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| DataIssue::TableUnavailable {
            table: SOURCE_TABLE.to_string(),
            reason: e.to_string(),
        })?;

    if rows.is_empty() {
        return Err(DataIssue::EmptyTable(SOURCE_TABLE.to_string()));
    }

    rows_to_frame(&rows)
}

fn rows_to_frame(rows: &[SqliteRow]) -> std::result::Result<DataFrame, DataIssue> {
    let mut columns: Vec<Column> = Vec::new();

    for name in NUMERIC_FEATURES {
        let values = rows
            .iter()
            .enumerate()
            .map(|(i, row)| cell::<f64>(row, i, name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        columns.push(Series::new(name.into(), values).into());
    }

    for name in CATEGORICAL_FEATURES {
        let values = rows
            .iter()
            .enumerate()
            .map(|(i, row)| cell::<String>(row, i, name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        columns.push(Series::new(name.into(), values).into());
    }

    for name in BINARY_FEATURES.iter().chain(std::iter::once(&TARGET)) {
        let values = rows
            .iter()
            .enumerate()
            .map(|(i, row)| cell::<i64>(row, i, name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        columns.push(Series::new((*name).into(), values).into());
    }

    DataFrame::new(columns).map_err(|e| DataIssue::Frame(e.to_string()))
}

fn cell<T>(row: &SqliteRow, idx: usize, column: &str) -> std::result::Result<T, DataIssue>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    // SQLite hands NULL back as the type's zero unless asked for an Option
    let value = row
        .try_get::<Option<T>, _>(column)
        .map_err(|e| DataIssue::MalformedRow {
            row: idx,
            reason: format!("{}: {}", column, e),
        })?;
    value.ok_or_else(|| DataIssue::MalformedRow {
        row: idx,
        reason: format!("{}: NULL", column),
    })
}
