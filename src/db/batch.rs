//! Chunked multi-row writes bounded by a bound-parameter limit.
//!
//! A batch is written as one `INSERT ... VALUES (..), (..)` statement per chunk,
//! with an `ON CONFLICT ... DO UPDATE` clause when the shape asks for one. The
//! number of rows per chunk is derived from the parameter limit and the number
//! of columns each row binds, so shapes of different widths chunk differently
//! under the same limit.

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection};
use thiserror::Error;
use tracing::debug;

/// A single bound parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
    Null,
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// `ON CONFLICT(target) DO UPDATE SET col = excluded.col, ...`
#[derive(Debug, Clone, Copy)]
pub struct OnConflict<'a> {
    pub target: &'a [&'a str],
    pub update: &'a [&'a str],
}

/// Target table, bound columns and conflict handling of a batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchShape<'a> {
    pub table: &'a str,
    pub columns: &'a [&'a str],
    pub conflict: Option<OnConflict<'a>>,
}

impl BatchShape<'_> {
    /// SQL for a chunk of `rows` rows.
    pub fn render_sql(&self, rows: usize) -> String {
        let row_placeholders = format!("({})", vec!["?"; self.columns.len()].join(", "));
        let values = vec![row_placeholders.as_str(); rows].join(", ");
        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            self.columns.join(", "),
            values
        );
        if let Some(conflict) = self.conflict {
            let assignments: Vec<String> = conflict
                .update
                .iter()
                .map(|col| format!("{col} = excluded.{col}"))
                .collect();
            sql.push_str(&format!(
                " ON CONFLICT({}) DO UPDATE SET {}",
                conflict.target.join(", "),
                assignments.join(", ")
            ));
        }
        sql
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch shape for {0} has no columns")]
    EmptyShape(String),
    #[error("row {row} binds {got} values, shape has {expected} columns")]
    ShapeMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// What a batch actually executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub statements: usize,
    pub rows: usize,
}

impl std::ops::AddAssign for BatchOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.statements += rhs.statements;
        self.rows += rhs.rows;
    }
}

/// Writes row batches under a maximum bound-parameter count per statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWriter {
    max_params: usize,
}

impl Default for BatchWriter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_PARAMS)
    }
}

impl BatchWriter {
    /// SQLite's historical `SQLITE_MAX_VARIABLE_NUMBER`.
    pub const DEFAULT_MAX_PARAMS: usize = 999;

    pub fn new(max_params: usize) -> Self {
        Self {
            max_params: max_params.max(1),
        }
    }

    pub fn max_params(&self) -> usize {
        self.max_params
    }

    /// Rows per statement for a shape binding `params_per_row` values per row.
    ///
    /// Never less than one row, even when a single row exceeds the limit.
    pub fn rows_per_chunk(&self, params_per_row: usize) -> usize {
        (self.max_params / params_per_row.max(1)).max(1)
    }

    /// Write `rows` in order. Stops at the first failing chunk.
    ///
    /// Earlier chunks are not undone here; run inside a transaction to make the
    /// batch atomic.
    pub async fn write(
        &self,
        conn: &mut SqliteConnection,
        shape: &BatchShape<'_>,
        rows: &[Vec<SqlValue>],
    ) -> Result<BatchOutcome, BatchError> {
        if rows.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let width = shape.columns.len();
        if width == 0 {
            return Err(BatchError::EmptyShape(shape.table.to_string()));
        }
        if let Some((row, values)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(BatchError::ShapeMismatch {
                row,
                expected: width,
                got: values.len(),
            });
        }

        let per_chunk = self.rows_per_chunk(width);
        let mut outcome = BatchOutcome::default();

        for chunk in rows.chunks(per_chunk) {
            let sql = shape.render_sql(chunk.len());
            let mut query = sqlx::query(&sql);
            for value in chunk.iter().flatten() {
                query = bind_value(query, value);
            }
            query.execute(&mut *conn).await?;

            outcome.statements += 1;
            outcome.rows += chunk.len();
        }

        debug!(
            table = shape.table,
            rows = outcome.rows,
            statements = outcome.statements,
            upsert = shape.conflict.is_some(),
            "Batch written"
        );
        Ok(outcome)
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Null => query.bind(None::<i64>),
    }
}
