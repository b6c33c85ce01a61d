//! Price ledger: per-date adult and child prices by occupancy.

use crate::db::batch::{BatchShape, BatchWriter, OnConflict, SqlValue};
use crate::domain::{
    ChildRateTable, Plan, PlanId, PriceRecord, PropertyId, RateTypeCode, TaxedAmount, UseDate,
    Wholesaler,
};
use crate::engine::child_price::rederive_child_prices;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::inventory::fetch_plan;
use super::{
    ensure_live_ids, ensure_range, last_wins, now_ms, parse_stored_date, placeholders,
    sorted_unique, LedgerError, Repository, ID_CHUNK,
};

const KEY: &[&str] = &["plan_id", "rate_type_code", "use_date"];

const CHILD_COLUMNS: [(&str, &str); 6] = [
    ("child_price1", "child_price1_in_tax"),
    ("child_price2", "child_price2_in_tax"),
    ("child_price3", "child_price3_in_tax"),
    ("child_price4", "child_price4_in_tax"),
    ("child_price5", "child_price5_in_tax"),
    ("child_price6", "child_price6_in_tax"),
];

const VALUE_COLUMNS: &[&str] = &[
    "price",
    "price_in_tax",
    "child_price1",
    "child_price1_in_tax",
    "child_price2",
    "child_price2_in_tax",
    "child_price3",
    "child_price3_in_tax",
    "child_price4",
    "child_price4_in_tax",
    "child_price5",
    "child_price5_in_tax",
    "child_price6",
    "child_price6_in_tax",
    "regular_price",
];

const CHILD_ONLY_UPDATE: &[&str] = &[
    "child_price1",
    "child_price1_in_tax",
    "child_price2",
    "child_price2_in_tax",
    "child_price3",
    "child_price3_in_tax",
    "child_price4",
    "child_price4_in_tax",
    "child_price5",
    "child_price5_in_tax",
    "child_price6",
    "child_price6_in_tax",
    "updated_at",
];

const SELECT_COLUMNS: &str = "p.plan_id, p.rate_type_code, p.use_date, p.price, p.price_in_tax, \
     p.child_price1, p.child_price1_in_tax, p.child_price2, p.child_price2_in_tax, \
     p.child_price3, p.child_price3_in_tax, p.child_price4, p.child_price4_in_tax, \
     p.child_price5, p.child_price5_in_tax, p.child_price6, p.child_price6_in_tax, \
     p.regular_price";

/// Column lists of the price write shapes and the conflict update set.
struct PriceColumns {
    update: Vec<&'static str>,
    insert: Vec<&'static str>,
    child_only: Vec<&'static str>,
    full_update: Vec<&'static str>,
}

impl PriceColumns {
    fn new() -> Self {
        let mut update: Vec<&'static str> = KEY.to_vec();
        update.extend_from_slice(VALUE_COLUMNS);
        update.push("updated_at");

        let mut insert = update.clone();
        insert.push("created_at");

        let mut child_only: Vec<&'static str> = KEY.to_vec();
        child_only.extend_from_slice(CHILD_ONLY_UPDATE);

        let mut full_update: Vec<&'static str> = VALUE_COLUMNS.to_vec();
        full_update.push("updated_at");

        Self {
            update,
            insert,
            child_only,
            full_update,
        }
    }
}

/// Counts of a price upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub statements: usize,
}

fn price_from_row(table: &str, row: &SqliteRow) -> Result<PriceRecord, LedgerError> {
    let use_date: String = row.get("use_date");
    let mut child_prices = [TaxedAmount::default(); 6];
    for (slot, (ex_col, in_col)) in child_prices.iter_mut().zip(CHILD_COLUMNS) {
        *slot = TaxedAmount::new(row.get(ex_col), row.get(in_col));
    }
    Ok(PriceRecord {
        plan_id: PlanId::new(row.get("plan_id")),
        rate_type_code: RateTypeCode(row.get("rate_type_code")),
        use_date: parse_stored_date(table, &use_date)?,
        price: row.get("price"),
        price_in_tax: row.get("price_in_tax"),
        child_prices,
        regular_price: row.get("regular_price"),
    })
}

fn key_values(row: &PriceRecord) -> Vec<SqlValue> {
    vec![
        SqlValue::from(row.plan_id.as_i64()),
        SqlValue::from(row.rate_type_code.as_str()),
        SqlValue::from(row.use_date.to_db_string()),
    ]
}

fn child_values(child_prices: &[TaxedAmount; 6]) -> impl Iterator<Item = SqlValue> + '_ {
    child_prices
        .iter()
        .flat_map(|c| [SqlValue::from(c.ex_tax), SqlValue::from(c.in_tax)])
}

/// Price rows of `plan_ids` with `use_date` in `[start, end]` (either bound optional).
async fn select_prices(
    conn: &mut SqliteConnection,
    table: &str,
    plan_ids: &[i64],
    start: Option<UseDate>,
    end: Option<UseDate>,
) -> Result<Vec<PriceRecord>, LedgerError> {
    let mut out = Vec::new();
    for chunk in plan_ids.chunks(ID_CHUNK) {
        let mut sql = format!(
            "SELECT {} FROM {} p WHERE p.plan_id IN ({})",
            SELECT_COLUMNS,
            table,
            placeholders(chunk.len())
        );
        if start.is_some() {
            sql.push_str(" AND p.use_date >= ?");
        }
        if end.is_some() {
            sql.push_str(" AND p.use_date <= ?");
        }
        sql.push_str(" ORDER BY p.plan_id ASC, p.use_date ASC, p.rate_type_code ASC");

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
            out.push(price_from_row(table, &row)?);
        }
    }
    Ok(out)
}

/// Re-derive and write the child columns of a plan's rows from `today` onward.
async fn update_child_prices_only_in(
    conn: &mut SqliteConnection,
    batch: &BatchWriter,
    channel: Wholesaler,
    plan: &Plan,
    today: UseDate,
) -> Result<usize, LedgerError> {
    let table = channel.tables().prices;
    let stored = select_prices(conn, &table, &[plan.id.as_i64()], Some(today), None).await?;

    let now = now_ms();
    let mut rows = Vec::with_capacity(stored.len());
    for record in &stored {
        let Some(child_prices) = rederive_child_prices(record, &plan.child_rates) else {
            warn!(
                channel = %channel,
                plan_id = %record.plan_id,
                rate_type_code = %record.rate_type_code,
                "Skipping price row with non-occupancy rate type code"
            );
            continue;
        };
        let mut values = key_values(record);
        values.extend(child_values(&child_prices));
        values.push(SqlValue::from(now));
        rows.push(values);
    }

    let columns = PriceColumns::new();
    let shape = BatchShape {
        table: &table,
        columns: &columns.child_only,
        conflict: Some(OnConflict {
            target: KEY,
            update: CHILD_ONLY_UPDATE,
        }),
    };
    batch.write(conn, &shape, &rows).await?;

    debug!(
        channel = %channel,
        plan_id = %plan.id,
        rows = rows.len(),
        "Child prices re-derived"
    );
    Ok(rows.len())
}

impl Repository {
    /// Price rows of the plans with `start <= use_date <= end`.
    ///
    /// # Errors
    /// `InvalidRange` when `start > end`, otherwise query errors.
    pub async fn query_prices_in_period(
        &self,
        channel: Wholesaler,
        plan_ids: &[PlanId],
        start: UseDate,
        end: UseDate,
    ) -> Result<Vec<PriceRecord>, LedgerError> {
        ensure_range(start, end)?;
        let ids = sorted_unique(plan_ids.iter().map(|id| id.as_i64()));
        let mut conn = self.pool.acquire().await?;
        select_prices(&mut conn, &channel.tables().prices, &ids, Some(start), Some(end)).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_prices_from(
        &self,
        channel: Wholesaler,
        plan_ids: &[PlanId],
        today: UseDate,
    ) -> Result<Vec<PriceRecord>, LedgerError> {
        let ids = sorted_unique(plan_ids.iter().map(|id| id.as_i64()));
        let mut conn = self.pool.acquire().await?;
        select_prices(&mut conn, &channel.tables().prices, &ids, Some(today), None).await
    }

    /// Price rows of every non-deleted plan of a property in `[start, end]`.
    ///
    /// # Errors
    /// `InvalidRange` when `start > end`, otherwise query errors.
    pub async fn query_property_prices(
        &self,
        channel: Wholesaler,
        property_id: PropertyId,
        start: UseDate,
        end: UseDate,
    ) -> Result<Vec<PriceRecord>, LedgerError> {
        ensure_range(start, end)?;
        let tables = channel.tables();
        let sql = format!(
            r#"
            SELECT {}
            FROM {} p
            JOIN {} pl ON pl.id = p.plan_id
            WHERE pl.property_id = ? AND pl.is_deleted = 0 AND p.use_date >= ? AND p.use_date <= ?
            ORDER BY p.plan_id ASC, p.use_date ASC, p.rate_type_code ASC
            "#,
            SELECT_COLUMNS, tables.prices, tables.plans
        );
        let rows = sqlx::query(&sql)
            .bind(property_id.as_i64())
            .bind(start.to_db_string())
            .bind(end.to_db_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| price_from_row(&tables.prices, row))
            .collect()
    }

    /// Insert or fully replace price rows in one transaction.
    ///
    /// Updates of existing keys are written before inserts of new ones.
    ///
    /// # Errors
    /// `InvalidRateTypeCode` for a code that is not a positive occupancy and
    /// `NotFound` for a missing plan, both before anything is written.
    pub async fn upsert_prices(
        &self,
        channel: Wholesaler,
        rows: &[PriceRecord],
    ) -> Result<PriceUpsertOutcome, LedgerError> {
        if let Some(bad) = rows.iter().find(|r| r.rate_type_code.occupancy().is_none()) {
            return Err(LedgerError::InvalidRateTypeCode(bad.rate_type_code.0.clone()));
        }
        let rows = last_wins(rows, PriceRecord::key);
        if rows.is_empty() {
            return Ok(PriceUpsertOutcome::default());
        }
        let tables = channel.tables();
        let plan_ids = sorted_unique(rows.iter().map(|r| r.plan_id.as_i64()));

        let mut tx = self.pool.begin().await?;
        ensure_live_ids(&mut tx, &tables.plans, "plan", &plan_ids).await?;

        let (min_date, max_date) = rows.iter().fold((rows[0].use_date, rows[0].use_date), |acc, r| {
            (acc.0.min(r.use_date), acc.1.max(r.use_date))
        });
        let existing: HashSet<(PlanId, RateTypeCode, UseDate)> =
            select_prices(&mut tx, &tables.prices, &plan_ids, Some(min_date), Some(max_date))
                .await?
                .iter()
                .map(PriceRecord::key)
                .collect();

        let now = now_ms();
        let mut updates = Vec::new();
        let mut inserts = Vec::new();
        for row in &rows {
            let mut values = key_values(row);
            values.push(SqlValue::from(row.price));
            values.push(SqlValue::from(row.price_in_tax));
            values.extend(child_values(&row.child_prices));
            values.push(SqlValue::from(row.regular_price));
            values.push(SqlValue::from(now));
            if existing.contains(&row.key()) {
                updates.push(values);
            } else {
                values.push(SqlValue::from(now));
                inserts.push(values);
            }
        }

        let columns = PriceColumns::new();
        let update_shape = BatchShape {
            table: &tables.prices,
            columns: &columns.update,
            conflict: Some(OnConflict {
                target: KEY,
                update: &columns.full_update,
            }),
        };
        let insert_shape = BatchShape {
            table: &tables.prices,
            columns: &columns.insert,
            conflict: None,
        };

        let mut written = self.batch.write(&mut tx, &update_shape, &updates).await?;
        written += self.batch.write(&mut tx, &insert_shape, &inserts).await?;
        tx.commit().await?;

        let outcome = PriceUpsertOutcome {
            inserted: inserts.len(),
            updated: updates.len(),
            statements: written.statements,
        };
        info!(
            channel = %channel,
            plans = plan_ids.len(),
            inserted = outcome.inserted,
            updated = outcome.updated,
            statements = outcome.statements,
            "Prices upserted"
        );
        Ok(outcome)
    }

    /// Re-derive the child columns of `plan`'s rows from `today` onward using
    /// its current child-rate table. Adult prices are left untouched.
    ///
    /// # Errors
    /// Returns an error if the read or write fails.
    pub async fn update_child_prices_only(
        &self,
        channel: Wholesaler,
        plan: &Plan,
        today: UseDate,
    ) -> Result<usize, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let rows = update_child_prices_only_in(&mut tx, &self.batch, channel, plan, today).await?;
        tx.commit().await?;
        Ok(rows)
    }

    /// Store a new child-rate table on a plan and re-derive its future child
    /// prices, in one transaction.
    ///
    /// # Errors
    /// `NotFound` when the plan does not exist.
    pub async fn update_plan_child_rates(
        &self,
        channel: Wholesaler,
        plan_id: PlanId,
        child_rates: ChildRateTable,
        today: UseDate,
    ) -> Result<usize, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let mut plan = fetch_plan(&mut tx, channel, plan_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("plan", plan_id))?;

        sqlx::query(&format!(
            "UPDATE {} SET child_rates = ?, updated_at = ? WHERE id = ?",
            channel.tables().plans
        ))
        .bind(serde_json::to_string(&child_rates)?)
        .bind(now_ms())
        .bind(plan_id.as_i64())
        .execute(&mut *tx)
        .await?;

        plan.child_rates = child_rates;
        let rows = update_child_prices_only_in(&mut tx, &self.batch, channel, &plan, today).await?;
        tx.commit().await?;

        info!(channel = %channel, plan_id = %plan_id, rows, "Plan child rates updated");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{date, plans, room, setup_test_db, CHANNEL};
    use super::*;
    use crate::domain::{ChildRate, ChildRateCategory, ChildTier};
    use crate::engine::child_price::{build_price_rows, AdultPriceInput};
    use rust_decimal::Decimal;

    fn input(day: &str, occupancy: u32, per_person: i64) -> AdultPriceInput {
        AdultPriceInput {
            use_date: date(day),
            occupancy,
            per_person_price: per_person,
            regular_price: 0,
        }
    }

    #[test]
    fn test_price_column_widths() {
        let columns = PriceColumns::new();
        assert_eq!(columns.update.len(), 19);
        assert_eq!(columns.insert.len(), 20);
        assert_eq!(columns.child_only.len(), 16);
    }

    #[tokio::test]
    async fn test_upsert_then_replace() {
        let (repo, _temp) = setup_test_db().await;
        let std = room(&repo, "STD", 5).await;
        let plan = plans(&repo, "BB", &[&std]).await.remove(0);

        let rows = build_price_rows(&plan, &[input("2024-06-01", 1, 8000), input("2024-06-01", 2, 7000)]);
        let first = repo.upsert_prices(CHANNEL, &rows).await.unwrap();
        assert_eq!((first.inserted, first.updated), (2, 0));

        let rows = build_price_rows(&plan, &[input("2024-06-01", 2, 7500), input("2024-06-02", 2, 7500)]);
        let second = repo.upsert_prices(CHANNEL, &rows).await.unwrap();
        assert_eq!((second.inserted, second.updated), (1, 1));

        let stored = repo
            .query_prices_in_period(CHANNEL, &[plan.id], date("2024-06-01"), date("2024-06-02"))
            .await
            .unwrap();
        assert_eq!(stored.len(), 3);
        let double = stored
            .iter()
            .find(|p| p.use_date == date("2024-06-01") && p.rate_type_code.as_str() == "2")
            .unwrap();
        assert_eq!(double.price, 15000);
        assert_eq!(double.price_in_tax, 16500);
    }

    #[tokio::test]
    async fn test_invalid_rate_type_code_rejected() {
        let (repo, _temp) = setup_test_db().await;
        let std = room(&repo, "STD", 5).await;
        let plan = plans(&repo, "BB", &[&std]).await.remove(0);

        let mut rows = build_price_rows(&plan, &[input("2024-06-01", 1, 8000)]);
        rows.push(PriceRecord {
            rate_type_code: RateTypeCode("twin".to_string()),
            ..rows[0].clone()
        });
        let err = repo.upsert_prices(CHANNEL, &rows).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRateTypeCode(code) if code == "twin"));

        let stored = repo.query_prices_from(CHANNEL, &[plan.id], date("2024-01-01")).await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_missing_plan_rejected() {
        let (repo, _temp) = setup_test_db().await;
        let std = room(&repo, "STD", 5).await;
        let mut plan = plans(&repo, "BB", &[&std]).await.remove(0);
        plan.id = PlanId::new(404);

        let rows = build_price_rows(&plan, &[input("2024-06-01", 1, 8000)]);
        let err = repo.upsert_prices(CHANNEL, &rows).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "plan", .. }));
    }

    #[tokio::test]
    async fn test_child_rate_change_rederives_future_rows_only() {
        let (repo, _temp) = setup_test_db().await;
        let std = room(&repo, "STD", 5).await;
        let plan = plans(&repo, "BB", &[&std]).await.remove(0);

        let rows = build_price_rows(
            &plan,
            &[input("2024-05-31", 2, 10000), input("2024-06-01", 2, 10000)],
        );
        repo.upsert_prices(CHANNEL, &rows).await.unwrap();

        let rates = ChildRateTable::default().with(
            ChildTier::Upper,
            ChildRate::new(ChildRateCategory::Percentage, Decimal::from(50)),
        );
        let changed = repo
            .update_plan_child_rates(CHANNEL, plan.id, rates, date("2024-06-01"))
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let stored = repo
            .query_prices_in_period(CHANNEL, &[plan.id], date("2024-05-31"), date("2024-06-01"))
            .await
            .unwrap();
        assert_eq!(stored[0].child_prices[0], TaxedAmount::default());
        assert_eq!(stored[1].child_prices[0], TaxedAmount::new(10000, 11000));
        assert_eq!(stored[1].price, 20000);

        let reloaded = repo.get_plan(CHANNEL, plan.id).await.unwrap().unwrap();
        assert_eq!(reloaded.child_rates, rates);
    }

    #[tokio::test]
    async fn test_update_child_rates_missing_plan() {
        let (repo, _temp) = setup_test_db().await;
        let err = repo
            .update_plan_child_rates(CHANNEL, PlanId::new(1), ChildRateTable::default(), date("2024-06-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "plan", .. }));
    }

    #[tokio::test]
    async fn test_property_prices_are_channel_scoped() {
        let (repo, _temp) = setup_test_db().await;
        let std = room(&repo, "STD", 5).await;
        let plan = plans(&repo, "BB", &[&std]).await.remove(0);
        repo.upsert_prices(CHANNEL, &build_price_rows(&plan, &[input("2024-06-01", 1, 8000)]))
            .await
            .unwrap();

        let here = repo
            .query_property_prices(CHANNEL, plan.property_id, date("2024-06-01"), date("2024-06-15"))
            .await
            .unwrap();
        assert_eq!(here.len(), 1);
        let elsewhere = repo
            .query_property_prices(Wholesaler::Rakutsu, plan.property_id, date("2024-06-01"), date("2024-06-15"))
            .await
            .unwrap();
        assert!(elsewhere.is_empty());
    }
}
