//! Stock ledger: per-date room inventory.
//!
//! Every write keeps `stock = room_count - booking_count`. Callers never
//! overwrite a stored booking count through an upsert; only
//! [`Repository::sync_booking_counts`] changes it.

use crate::db::batch::{BatchShape, BatchWriter, OnConflict, SqlValue};
use crate::domain::{
    BookingCount, DateScope, PropertyId, RoomTypeId, StockRecord, StockWindow, UseDate, Wholesaler,
};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, info};

use super::inventory::{fetch_room, window_columns};
use super::{
    ensure_live_ids, ensure_range, last_wins, now_ms, parse_stored_date, placeholders,
    sorted_unique, LedgerError, Repository, ID_CHUNK,
};

const KEY: &[&str] = &["room_type_id", "use_date"];

const UPDATE_COLUMNS: &[&str] = &[
    "room_type_id",
    "use_date",
    "room_count",
    "booking_count",
    "stock",
    "is_stop_sales",
    "updated_at",
];

const INSERT_COLUMNS: &[&str] = &[
    "room_type_id",
    "use_date",
    "room_count",
    "booking_count",
    "stock",
    "is_stop_sales",
    "created_at",
    "updated_at",
];

/// Counts of a stock upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub statements: usize,
}

fn stock_from_row(table: &str, row: &SqliteRow) -> Result<StockRecord, LedgerError> {
    let use_date: String = row.get("use_date");
    Ok(StockRecord {
        room_type_id: RoomTypeId::new(row.get("room_type_id")),
        use_date: parse_stored_date(table, &use_date)?,
        room_count: row.get("room_count"),
        booking_count: row.get("booking_count"),
        stock: row.get("stock"),
        is_stop_sales: row.get("is_stop_sales"),
    })
}

/// Stock rows of `room_ids` with `use_date` in `[start, end]` (either bound optional).
async fn select_stocks(
    conn: &mut SqliteConnection,
    table: &str,
    room_ids: &[i64],
    start: Option<UseDate>,
    end: Option<UseDate>,
) -> Result<Vec<StockRecord>, LedgerError> {
    let mut out = Vec::new();
    for chunk in room_ids.chunks(ID_CHUNK) {
        let mut sql = format!(
            "SELECT room_type_id, use_date, room_count, booking_count, stock, is_stop_sales \
             FROM {} WHERE room_type_id IN ({})",
            table,
            placeholders(chunk.len())
        );
        if start.is_some() {
            sql.push_str(" AND use_date >= ?");
        }
        if end.is_some() {
            sql.push_str(" AND use_date <= ?");
        }
        sql.push_str(" ORDER BY room_type_id ASC, use_date ASC");

        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(*id);
        }
        if let Some(start) = start {
            query = query.bind(start.to_db_string());
        }
        if let Some(end) = end {
            query = query.bind(end.to_db_string());
        }

        for row in query.fetch_all(&mut *conn).await? {
            out.push(stock_from_row(table, &row)?);
        }
    }
    Ok(out)
}

/// Upsert stock rows on an open connection, normally a transaction.
///
/// Existing rows keep their stored booking count; new rows take the caller's.
pub(super) async fn upsert_stocks_in(
    conn: &mut SqliteConnection,
    batch: &BatchWriter,
    channel: Wholesaler,
    rows: &[StockRecord],
) -> Result<StockUpsertOutcome, LedgerError> {
    let rows = last_wins(rows, StockRecord::key);
    if rows.is_empty() {
        return Ok(StockUpsertOutcome::default());
    }
    let tables = channel.tables();

    let room_ids = sorted_unique(rows.iter().map(|r| r.room_type_id.as_i64()));
    ensure_live_ids(conn, &tables.room_types, "room type", &room_ids).await?;

    let (min_date, max_date) = rows.iter().fold((rows[0].use_date, rows[0].use_date), |acc, r| {
        (acc.0.min(r.use_date), acc.1.max(r.use_date))
    });
    let existing: HashMap<(RoomTypeId, UseDate), i64> =
        select_stocks(conn, &tables.stocks, &room_ids, Some(min_date), Some(max_date))
            .await?
            .into_iter()
            .map(|s| (s.key(), s.booking_count))
            .collect();

    let now = now_ms();
    let mut updates: Vec<Vec<SqlValue>> = Vec::new();
    let mut inserts: Vec<Vec<SqlValue>> = Vec::new();
    for row in &rows {
        let mut values = vec![
            SqlValue::from(row.room_type_id.as_i64()),
            SqlValue::from(row.use_date.to_db_string()),
            SqlValue::from(row.room_count),
        ];
        match existing.get(&row.key()) {
            Some(&booking_count) => {
                values.extend([
                    SqlValue::from(booking_count),
                    SqlValue::from(StockRecord::derive_stock(row.room_count, booking_count)),
                    SqlValue::from(row.is_stop_sales),
                    SqlValue::from(now),
                ]);
                updates.push(values);
            }
            None => {
                values.extend([
                    SqlValue::from(row.booking_count),
                    SqlValue::from(StockRecord::derive_stock(row.room_count, row.booking_count)),
                    SqlValue::from(row.is_stop_sales),
                    SqlValue::from(now),
                    SqlValue::from(now),
                ]);
                inserts.push(values);
            }
        }
    }

    let update_shape = BatchShape {
        table: &tables.stocks,
        columns: UPDATE_COLUMNS,
        conflict: Some(OnConflict {
            target: KEY,
            update: &["room_count", "stock", "is_stop_sales", "updated_at"],
        }),
    };
    let insert_shape = BatchShape {
        table: &tables.stocks,
        columns: INSERT_COLUMNS,
        conflict: None,
    };

    let mut written = batch.write(conn, &update_shape, &updates).await?;
    written += batch.write(conn, &insert_shape, &inserts).await?;

    let outcome = StockUpsertOutcome {
        inserted: inserts.len(),
        updated: updates.len(),
        statements: written.statements,
    };
    debug!(
        channel = %channel,
        inserted = outcome.inserted,
        updated = outcome.updated,
        statements = outcome.statements,
        "Stock rows upserted"
    );
    Ok(outcome)
}

/// Set the stop-sales flag of the rooms' stock rows in `scope`. Returns rows changed.
pub(super) async fn update_stock_stop_sales_in(
    conn: &mut SqliteConnection,
    channel: Wholesaler,
    room_ids: &[i64],
    scope: DateScope,
    is_stop_sales: bool,
) -> Result<u64, LedgerError> {
    let table = channel.tables().stocks;
    let now = now_ms();
    let mut affected = 0;

    for chunk in room_ids.chunks(ID_CHUNK) {
        let mut sql = format!(
            "UPDATE {} SET is_stop_sales = ?, updated_at = ? WHERE room_type_id IN ({})",
            table,
            placeholders(chunk.len())
        );
        let date = match scope {
            DateScope::AllDates => None,
            DateScope::On(date) => {
                sql.push_str(" AND use_date = ?");
                Some(date)
            }
            DateScope::From(date) => {
                sql.push_str(" AND use_date >= ?");
                Some(date)
            }
        };

        let mut query = sqlx::query(&sql).bind(is_stop_sales).bind(now);
        for id in chunk {
            query = query.bind(*id);
        }
        if let Some(date) = date {
            query = query.bind(date.to_db_string());
        }
        affected += query.execute(&mut *conn).await?.rows_affected();
    }
    Ok(affected)
}

impl Repository {
    /// Stock rows of the rooms with `start <= use_date <= end`, ordered by room then date.
    ///
    /// # Errors
    /// `InvalidRange` when `start > end`, otherwise query errors.
    pub async fn query_stocks_in_range(
        &self,
        channel: Wholesaler,
        room_type_ids: &[RoomTypeId],
        start: UseDate,
        end: UseDate,
    ) -> Result<Vec<StockRecord>, LedgerError> {
        ensure_range(start, end)?;
        let ids = sorted_unique(room_type_ids.iter().map(|id| id.as_i64()));
        let mut conn = self.pool.acquire().await?;
        select_stocks(&mut conn, &channel.tables().stocks, &ids, Some(start), Some(end)).await
    }

    /// Stock rows of the rooms from `today` onward.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_stocks_from(
        &self,
        channel: Wholesaler,
        room_type_ids: &[RoomTypeId],
        today: UseDate,
    ) -> Result<Vec<StockRecord>, LedgerError> {
        let ids = sorted_unique(room_type_ids.iter().map(|id| id.as_i64()));
        let mut conn = self.pool.acquire().await?;
        select_stocks(&mut conn, &channel.tables().stocks, &ids, Some(today), None).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_stock(
        &self,
        channel: Wholesaler,
        room_type_id: RoomTypeId,
        use_date: UseDate,
    ) -> Result<Option<StockRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let mut rows = select_stocks(
            &mut conn,
            &channel.tables().stocks,
            &[room_type_id.as_i64()],
            Some(use_date),
            Some(use_date),
        )
        .await?;
        Ok(rows.pop())
    }

    /// Stock rows of every non-deleted room of a property in `[start, end]`.
    ///
    /// # Errors
    /// `InvalidRange` when `start > end`, otherwise query errors.
    pub async fn query_property_stocks(
        &self,
        channel: Wholesaler,
        property_id: PropertyId,
        start: UseDate,
        end: UseDate,
    ) -> Result<Vec<StockRecord>, LedgerError> {
        ensure_range(start, end)?;
        let tables = channel.tables();
        let sql = format!(
            r#"
            SELECT s.room_type_id, s.use_date, s.room_count, s.booking_count, s.stock, s.is_stop_sales
            FROM {} s
            JOIN {} r ON r.id = s.room_type_id
            WHERE r.property_id = ? AND r.is_deleted = 0 AND s.use_date >= ? AND s.use_date <= ?
            ORDER BY s.room_type_id ASC, s.use_date ASC
            "#,
            tables.stocks, tables.room_types
        );
        let rows = sqlx::query(&sql)
            .bind(property_id.as_i64())
            .bind(start.to_db_string())
            .bind(end.to_db_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| stock_from_row(&tables.stocks, row))
            .collect()
    }

    /// Insert or update stock rows in one transaction.
    ///
    /// Duplicate keys in `rows` collapse to the last one. Existing rows keep
    /// their stored booking count and get a re-derived stock.
    ///
    /// # Errors
    /// `NotFound` when a referenced room does not exist; nothing is written.
    pub async fn upsert_stocks(
        &self,
        channel: Wholesaler,
        rows: &[StockRecord],
    ) -> Result<StockUpsertOutcome, LedgerError> {
        if rows.is_empty() {
            return Ok(StockUpsertOutcome::default());
        }
        let mut tx = self.pool.begin().await?;
        let outcome = upsert_stocks_in(&mut tx, &self.batch, channel, rows).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Returns the number of stock rows changed.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_stock_stop_sales(
        &self,
        channel: Wholesaler,
        room_type_ids: &[RoomTypeId],
        scope: DateScope,
        is_stop_sales: bool,
    ) -> Result<u64, LedgerError> {
        let ids = sorted_unique(room_type_ids.iter().map(|id| id.as_i64()));
        if ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let affected = update_stock_stop_sales_in(&mut tx, channel, &ids, scope, is_stop_sales).await?;
        tx.commit().await?;
        Ok(affected)
    }

    /// Overwrite booking counts of existing stock rows in `[start, end]` from an
    /// external count source. Rows with no supplied count drop to zero bookings.
    ///
    /// Returns the number of rows whose booking count changed.
    ///
    /// # Errors
    /// `InvalidRange` when `start > end`, otherwise database errors.
    pub async fn sync_booking_counts(
        &self,
        channel: Wholesaler,
        room_type_ids: &[RoomTypeId],
        start: UseDate,
        end: UseDate,
        counts: &[BookingCount],
    ) -> Result<usize, LedgerError> {
        ensure_range(start, end)?;
        let ids = sorted_unique(room_type_ids.iter().map(|id| id.as_i64()));
        if ids.is_empty() {
            return Ok(0);
        }
        let table = channel.tables().stocks;

        let supplied: HashMap<(i64, UseDate), i64> = counts
            .iter()
            .map(|c| ((c.target_id, c.use_date), c.count))
            .collect();

        let mut tx = self.pool.begin().await?;
        let existing = select_stocks(&mut tx, &table, &ids, Some(start), Some(end)).await?;

        let now = now_ms();
        let rows: Vec<Vec<SqlValue>> = existing
            .iter()
            .filter_map(|s| {
                let count = supplied
                    .get(&(s.room_type_id.as_i64(), s.use_date))
                    .copied()
                    .unwrap_or(0);
                (count != s.booking_count).then(|| {
                    vec![
                        SqlValue::from(s.room_type_id.as_i64()),
                        SqlValue::from(s.use_date.to_db_string()),
                        SqlValue::from(s.room_count),
                        SqlValue::from(count),
                        SqlValue::from(StockRecord::derive_stock(s.room_count, count)),
                        SqlValue::from(s.is_stop_sales),
                        SqlValue::from(now),
                    ]
                })
            })
            .collect();

        let shape = BatchShape {
            table: &table,
            columns: UPDATE_COLUMNS,
            conflict: Some(OnConflict {
                target: KEY,
                update: &["booking_count", "stock", "updated_at"],
            }),
        };
        self.batch.write(&mut tx, &shape, &rows).await?;
        tx.commit().await?;

        info!(
            channel = %channel,
            rooms = ids.len(),
            scanned = existing.len(),
            changed = rows.len(),
            "Booking counts reconciled"
        );
        Ok(rows.len())
    }

    /// Set a room's capacity and stock window and regenerate its stock rows for
    /// every window date from `today`, in one transaction.
    ///
    /// Existing dates keep their booking count and stop-sales flag; new dates
    /// inherit the room's flag.
    ///
    /// # Errors
    /// `NotFound` when the room does not exist.
    pub async fn save_room_inventory(
        &self,
        channel: Wholesaler,
        room_type_id: RoomTypeId,
        room_count: i64,
        window: StockWindow,
        today: UseDate,
        horizon_days: u32,
    ) -> Result<StockUpsertOutcome, LedgerError> {
        let tables = channel.tables();
        let mut tx = self.pool.begin().await?;

        let room = fetch_room(&mut tx, channel, room_type_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("room type", room_type_id))?;

        let (is_year_round, start, end) = window_columns(&window);
        sqlx::query(&format!(
            r#"
            UPDATE {} SET room_count = ?, is_year_round = ?, stock_start_date = ?,
                stock_end_date = ?, updated_at = ?
            WHERE id = ?
            "#,
            tables.room_types
        ))
        .bind(room_count)
        .bind(is_year_round)
        .bind(start)
        .bind(end)
        .bind(now_ms())
        .bind(room_type_id.as_i64())
        .execute(&mut *tx)
        .await?;

        let dates = window.dates_from(today, horizon_days);
        let outcome = match (dates.first(), dates.last()) {
            (Some(&first), Some(&last)) => {
                let stop_flags: HashMap<UseDate, bool> = select_stocks(
                    &mut tx,
                    &tables.stocks,
                    &[room_type_id.as_i64()],
                    Some(first),
                    Some(last),
                )
                .await?
                .into_iter()
                .map(|s| (s.use_date, s.is_stop_sales))
                .collect();

                let rows: Vec<StockRecord> = dates
                    .iter()
                    .map(|&date| {
                        let stopped = stop_flags.get(&date).copied().unwrap_or(room.is_stop_sales);
                        StockRecord::new(room_type_id, date, room_count).with_stop_sales(stopped)
                    })
                    .collect();
                upsert_stocks_in(&mut tx, &self.batch, channel, &rows).await?
            }
            _ => StockUpsertOutcome::default(),
        };

        tx.commit().await?;

        info!(
            channel = %channel,
            room_type_id = %room_type_id,
            room_count,
            inserted = outcome.inserted,
            updated = outcome.updated,
            "Room inventory saved"
        );
        Ok(outcome)
    }
}
