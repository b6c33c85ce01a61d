//! Room types, plans, plan groups and cancellation policies.

use crate::domain::{
    CancelPolicy, CancelPolicyId, ChildRateTable, NewPlanGroup, NewRoomType, Plan, PlanGroupId,
    PlanId, PropertyId, RoomType, RoomTypeId, StockWindow, TaxCategory, Wholesaler,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::info;

use super::{ensure_live_ids, now_ms, parse_stored_date, placeholders, LedgerError, Repository};

const ROOM_COLUMNS: &str = "id, property_id, code, name, room_count, min_occupancy, max_occupancy, \
     is_stop_sales, is_year_round, stock_start_date, stock_end_date";

const PLAN_COLUMNS: &str = "id, property_id, room_type_id, plan_group_id, code, name, \
     is_tax_included, child_rates, is_stop_sales, cancel_policy_id";

/// Stored columns for a stock window: `(is_year_round, start, end)`.
pub(super) fn window_columns(window: &StockWindow) -> (bool, Option<String>, Option<String>) {
    match window {
        StockWindow::YearRound => (true, None, None),
        StockWindow::Range { start, end } => {
            (false, Some(start.to_db_string()), Some(end.to_db_string()))
        }
    }
}

fn room_from_row(table: &str, row: &SqliteRow) -> Result<RoomType, LedgerError> {
    let stock_window = if row.get::<bool, _>("is_year_round") {
        StockWindow::YearRound
    } else {
        let start: Option<String> = row.get("stock_start_date");
        let end: Option<String> = row.get("stock_end_date");
        match (start, end) {
            (Some(start), Some(end)) => StockWindow::Range {
                start: parse_stored_date(table, &start)?,
                end: parse_stored_date(table, &end)?,
            },
            _ => {
                return Err(LedgerError::CorruptRow {
                    table: table.to_string(),
                    detail: "range window without start and end dates".to_string(),
                })
            }
        }
    };

    Ok(RoomType {
        id: RoomTypeId::new(row.get("id")),
        property_id: PropertyId::new(row.get("property_id")),
        code: row.get("code"),
        name: row.get("name"),
        room_count: row.get("room_count"),
        min_occupancy: row.get::<u32, _>("min_occupancy"),
        max_occupancy: row.get::<u32, _>("max_occupancy"),
        is_stop_sales: row.get("is_stop_sales"),
        stock_window,
    })
}

fn plan_from_row(row: &SqliteRow) -> Result<Plan, LedgerError> {
    let child_rates: String = row.get("child_rates");
    let child_rates: ChildRateTable = serde_json::from_str(&child_rates)?;
    Ok(Plan {
        id: PlanId::new(row.get("id")),
        property_id: PropertyId::new(row.get("property_id")),
        room_type_id: RoomTypeId::new(row.get("room_type_id")),
        plan_group_id: PlanGroupId::new(row.get("plan_group_id")),
        code: row.get("code"),
        name: row.get("name"),
        tax_category: TaxCategory::from_included_flag(row.get("is_tax_included")),
        child_rates,
        is_stop_sales: row.get("is_stop_sales"),
        cancel_policy_id: row
            .get::<Option<i64>, _>("cancel_policy_id")
            .map(CancelPolicyId::new),
    })
}

/// Load a non-deleted room inside an open transaction.
pub(super) async fn fetch_room(
    conn: &mut SqliteConnection,
    channel: Wholesaler,
    room_type_id: RoomTypeId,
) -> Result<Option<RoomType>, LedgerError> {
    let table = channel.tables().room_types;
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ? AND is_deleted = 0",
        ROOM_COLUMNS, table
    );
    sqlx::query(&sql)
        .bind(room_type_id.as_i64())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| room_from_row(&table, &row))
        .transpose()
}

/// Load a non-deleted plan inside an open transaction.
pub(super) async fn fetch_plan(
    conn: &mut SqliteConnection,
    channel: Wholesaler,
    plan_id: PlanId,
) -> Result<Option<Plan>, LedgerError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ? AND is_deleted = 0",
        PLAN_COLUMNS,
        channel.tables().plans
    );
    sqlx::query(&sql)
        .bind(plan_id.as_i64())
        .fetch_optional(&mut *conn)
        .await?
        .map(|row| plan_from_row(&row))
        .transpose()
}

impl Repository {
    /// Register a room type.
    ///
    /// # Errors
    /// `DuplicateCode` when a non-deleted room of the property already uses the code.
    pub async fn create_room_type(
        &self,
        channel: Wholesaler,
        room: NewRoomType,
    ) -> Result<RoomType, LedgerError> {
        let table = channel.tables().room_types;
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE property_id = ? AND code = ? AND is_deleted = 0",
            table
        ))
        .bind(room.property_id.as_i64())
        .bind(&room.code)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(LedgerError::DuplicateCode {
                entity: "room type",
                code: room.code,
            });
        }

        let (is_year_round, start, end) = window_columns(&room.stock_window);
        let now = now_ms();
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {} (
                property_id, code, name, room_count, min_occupancy, max_occupancy,
                is_year_round, stock_start_date, stock_end_date, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            table
        ))
        .bind(room.property_id.as_i64())
        .bind(&room.code)
        .bind(&room.name)
        .bind(room.room_count)
        .bind(room.min_occupancy)
        .bind(room.max_occupancy)
        .bind(is_year_round)
        .bind(start)
        .bind(end)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let id = RoomTypeId::new(result.last_insert_rowid());
        info!(channel = %channel, room_type_id = %id, code = %room.code, "Room type created");

        Ok(RoomType {
            id,
            property_id: room.property_id,
            code: room.code,
            name: room.name,
            room_count: room.room_count,
            min_occupancy: room.min_occupancy,
            max_occupancy: room.max_occupancy,
            is_stop_sales: false,
            stock_window: room.stock_window,
        })
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_room_type(
        &self,
        channel: Wholesaler,
        room_type_id: RoomTypeId,
    ) -> Result<Option<RoomType>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        fetch_room(&mut conn, channel, room_type_id).await
    }

    /// Non-deleted rooms of a property, ordered by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_room_types(
        &self,
        channel: Wholesaler,
        property_id: PropertyId,
    ) -> Result<Vec<RoomType>, LedgerError> {
        let table = channel.tables().room_types;
        let sql = format!(
            "SELECT {} FROM {} WHERE property_id = ? AND is_deleted = 0 ORDER BY id ASC",
            ROOM_COLUMNS, table
        );
        let rows = sqlx::query(&sql)
            .bind(property_id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| room_from_row(&table, row)).collect()
    }

    /// Take the next plan-group id.
    ///
    /// The sequence row is incremented in its own short transaction so the write
    /// lock is released as soon as the id is known. Ids are never reused, even
    /// if the caller's subsequent insert fails.
    ///
    /// # Errors
    /// Returns an error if the sequence row is missing or the update fails.
    pub async fn allocate_plan_group_id(&self) -> Result<PlanGroupId, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let next: Option<(i64,)> = sqlx::query_as(
            "UPDATE sequences SET value = value + 1 WHERE name = 'plan_group' RETURNING value",
        )
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        next.map(|(value,)| PlanGroupId::new(value))
            .ok_or_else(|| LedgerError::not_found("sequence", "plan_group"))
    }

    /// Create one plan per target room, all sharing a freshly allocated group id.
    ///
    /// # Errors
    /// `NotFound` for a missing room, `DuplicateCode` when a non-deleted plan of
    /// any target room already uses the code. Nothing is written on error.
    pub async fn create_plan_group(
        &self,
        channel: Wholesaler,
        group: NewPlanGroup,
    ) -> Result<Vec<Plan>, LedgerError> {
        let tables = channel.tables();
        let room_ids: Vec<i64> = group.room_type_ids.iter().map(|id| id.as_i64()).collect();
        if room_ids.is_empty() {
            return Ok(Vec::new());
        }

        {
            let mut conn = self.pool.acquire().await?;
            ensure_live_ids(&mut conn, &tables.room_types, "room type", &room_ids).await?;

            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE code = ? AND is_deleted = 0 AND room_type_id IN ({})",
                tables.plans,
                placeholders(room_ids.len())
            );
            let mut query = sqlx::query_as::<_, (i64,)>(&sql).bind(&group.code);
            for id in &room_ids {
                query = query.bind(*id);
            }
            let (taken,) = query.fetch_one(&mut *conn).await?;
            if taken > 0 {
                return Err(LedgerError::DuplicateCode {
                    entity: "plan",
                    code: group.code,
                });
            }
        }

        let plan_group_id = self.allocate_plan_group_id().await?;
        let child_rates = serde_json::to_string(&group.child_rates)?;
        let now = now_ms();

        let mut tx = self.pool.begin().await?;
        let mut plans = Vec::with_capacity(room_ids.len());
        for room_type_id in &group.room_type_ids {
            let result = sqlx::query(&format!(
                r#"
                INSERT INTO {} (
                    property_id, room_type_id, plan_group_id, code, name, is_tax_included,
                    child_rates, cancel_policy_id, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                tables.plans
            ))
            .bind(group.property_id.as_i64())
            .bind(room_type_id.as_i64())
            .bind(plan_group_id.as_i64())
            .bind(&group.code)
            .bind(&group.name)
            .bind(group.tax_category.is_included())
            .bind(&child_rates)
            .bind(group.cancel_policy_id.map(|id| id.as_i64()))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            plans.push(Plan {
                id: PlanId::new(result.last_insert_rowid()),
                property_id: group.property_id,
                room_type_id: *room_type_id,
                plan_group_id,
                code: group.code.clone(),
                name: group.name.clone(),
                tax_category: group.tax_category,
                child_rates: group.child_rates,
                is_stop_sales: false,
                cancel_policy_id: group.cancel_policy_id,
            });
        }
        tx.commit().await?;

        info!(
            channel = %channel,
            plan_group_id = %plan_group_id,
            plans = plans.len(),
            "Plan group created"
        );
        Ok(plans)
    }

    /// # Errors
    /// Returns an error if the query fails or the stored child rates are unreadable.
    pub async fn get_plan(
        &self,
        channel: Wholesaler,
        plan_id: PlanId,
    ) -> Result<Option<Plan>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        fetch_plan(&mut conn, channel, plan_id).await
    }

    /// Non-deleted plans of a property, ordered by id.
    ///
    /// # Errors
    /// Returns an error if the query fails or the stored child rates are unreadable.
    pub async fn query_plans(
        &self,
        channel: Wholesaler,
        property_id: PropertyId,
    ) -> Result<Vec<Plan>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE property_id = ? AND is_deleted = 0 ORDER BY id ASC",
            PLAN_COLUMNS,
            channel.tables().plans
        );
        let rows = sqlx::query(&sql)
            .bind(property_id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(plan_from_row).collect()
    }

    /// # Errors
    /// Returns an error if the query fails or the stored child rates are unreadable.
    pub async fn query_plans_for_room(
        &self,
        channel: Wholesaler,
        room_type_id: RoomTypeId,
    ) -> Result<Vec<Plan>, LedgerError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE room_type_id = ? AND is_deleted = 0 ORDER BY id ASC",
            PLAN_COLUMNS,
            channel.tables().plans
        );
        let rows = sqlx::query(&sql)
            .bind(room_type_id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(plan_from_row).collect()
    }

    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_cancel_policy(
        &self,
        property_id: PropertyId,
        name: &str,
        policy: &CancelPolicy,
    ) -> Result<CancelPolicyId, LedgerError> {
        let windows = serde_json::to_string(policy)?;
        let now = now_ms();
        let result = sqlx::query(
            r#"
            INSERT INTO cancel_policies (property_id, name, windows, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(property_id.as_i64())
        .bind(name)
        .bind(windows)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(CancelPolicyId::new(result.last_insert_rowid()))
    }

    /// # Errors
    /// Returns an error if the query fails or the stored windows are unreadable.
    pub async fn get_cancel_policy(
        &self,
        id: CancelPolicyId,
    ) -> Result<Option<CancelPolicy>, LedgerError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT windows FROM cancel_policies WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((windows,)) => Ok(Some(serde_json::from_str(&windows)?)),
            None => Ok(None),
        }
    }
}
