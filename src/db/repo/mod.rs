//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Every ledger method takes the [`Wholesaler`] whose table set it works on.
//! Methods are organized across submodules by domain:
//! - `stocks.rs` - Stock ledger reads, upserts and booking-count reconciliation
//! - `prices.rs` - Price ledger reads, upserts and child-price re-derivation
//! - `inventory.rs` - Room types, plans, plan groups and cancellation policies
//! - `stop_sales.rs` - Stop-sales propagation between rooms, plans and stock
//! - `bookings.rs` - Bookings written by the booking system

mod bookings;
mod inventory;
mod prices;
mod stocks;
mod stop_sales;

pub use prices::PriceUpsertOutcome;
pub use stocks::StockUpsertOutcome;
pub use stop_sales::{PlanStopSalesOutcome, RoomStopSalesOutcome};

use crate::db::batch::{BatchError, BatchWriter};
use crate::domain::UseDate;
use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::Row;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// SQLite has a 999 parameter limit; chunk ID lists to 500 for safety margin.
const ID_CHUNK: usize = 500;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} code {code:?} already exists")]
    DuplicateCode { entity: &'static str, code: String },
    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: UseDate, end: UseDate },
    #[error("rate type code {0:?} is not an occupancy count")]
    InvalidRateTypeCode(String),
    #[error("corrupt {table} row: {detail}")]
    CorruptRow { table: String, detail: String },
    #[error("invalid stored JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
    batch: BatchWriter,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_batch_writer(pool, BatchWriter::default())
    }

    /// Create a repository whose batch writes use `batch`'s parameter limit.
    pub fn with_batch_writer(pool: SqlitePool, batch: BatchWriter) -> Self {
        Repository { pool, batch }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn batch_writer(&self) -> &BatchWriter {
        &self.batch
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn ensure_range(start: UseDate, end: UseDate) -> Result<(), LedgerError> {
    crate::domain::primitives::ensure_ordered(start, end)
        .map_err(|(start, end)| LedgerError::InvalidRange { start, end })
}

fn parse_stored_date(table: &str, raw: &str) -> Result<UseDate, LedgerError> {
    UseDate::from_str(raw).map_err(|e| LedgerError::CorruptRow {
        table: table.to_string(),
        detail: e.to_string(),
    })
}

/// Deduplicate by key keeping the last occurrence at the first occurrence's position.
fn last_wins<T: Clone, K: Eq + Hash>(rows: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
    let mut index: HashMap<K, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<T> = Vec::with_capacity(rows.len());
    for row in rows {
        match index.entry(key(row)) {
            Entry::Occupied(e) => out[*e.get()] = row.clone(),
            Entry::Vacant(e) => {
                e.insert(out.len());
                out.push(row.clone());
            }
        }
    }
    out
}

/// Fail with `NotFound` for the first id missing (or soft-deleted) from `table`.
async fn ensure_live_ids(
    conn: &mut SqliteConnection,
    table: &str,
    entity: &'static str,
    ids: &[i64],
) -> Result<(), LedgerError> {
    for chunk in ids.chunks(ID_CHUNK) {
        let sql = format!(
            "SELECT id FROM {} WHERE is_deleted = 0 AND id IN ({})",
            table,
            placeholders(chunk.len())
        );
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(*id);
        }
        let found: HashSet<i64> = query
            .fetch_all(&mut *conn)
            .await?
            .iter()
            .map(|row| row.get::<i64, _>("id"))
            .collect();

        if let Some(missing) = chunk.iter().find(|id| !found.contains(id)) {
            return Err(LedgerError::not_found(entity, missing));
        }
    }
    Ok(())
}

fn sorted_unique(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_wins_keeps_first_position() {
        let rows = vec![(1, "a"), (2, "b"), (1, "c")];
        let out = last_wins(&rows, |r| r.0);
        assert_eq!(out, vec![(1, "c"), (2, "b")]);
    }

    #[test]
    fn test_sorted_unique() {
        assert_eq!(sorted_unique([3, 1, 3, 2]), vec![1, 2, 3]);
    }

    #[test]
    fn test_ensure_range() {
        let a: UseDate = "2024-06-01".parse().unwrap();
        let b: UseDate = "2024-06-02".parse().unwrap();
        assert!(ensure_range(a, b).is_ok());
        assert!(ensure_range(a, a).is_ok());
        assert!(matches!(
            ensure_range(b, a),
            Err(LedgerError::InvalidRange { .. })
        ));
    }
}
