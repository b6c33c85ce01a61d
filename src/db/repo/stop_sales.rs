//! Stop-sales propagation between rooms, their plans and their stock rows.

use crate::domain::{DateScope, PlanId, RoomTypeId, SalesState, Wholesaler};
use serde::Serialize;
use tracing::info;

use super::inventory::{fetch_plan, fetch_room};
use super::stocks::update_stock_stop_sales_in;
use super::{now_ms, LedgerError, Repository};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStopSalesOutcome {
    pub plans_updated: usize,
    pub stocks_updated: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStopSalesOutcome {
    /// The parent room was re-enabled because no stopped plan remained.
    pub room_reopened: bool,
}

impl Repository {
    /// Stop or resume a room, cascading to every attached plan and, when a
    /// scope is given, to the room's stock rows in that scope.
    ///
    /// Runs in one transaction: a failure on any plan leaves the room flag,
    /// every plan and every stock row as they were.
    ///
    /// # Errors
    /// `NotFound` when the room, or a plan being updated, does not exist.
    pub async fn set_room_stop_sales(
        &self,
        channel: Wholesaler,
        room_type_id: RoomTypeId,
        is_stop_sales: bool,
        stock_scope: Option<DateScope>,
    ) -> Result<RoomStopSalesOutcome, LedgerError> {
        let tables = channel.tables();
        let now = now_ms();
        let mut tx = self.pool.begin().await?;

        let room = sqlx::query(&format!(
            "UPDATE {} SET is_stop_sales = ?, updated_at = ? WHERE id = ? AND is_deleted = 0",
            tables.room_types
        ))
        .bind(is_stop_sales)
        .bind(now)
        .bind(room_type_id.as_i64())
        .execute(&mut *tx)
        .await?;
        if room.rows_affected() == 0 {
            return Err(LedgerError::not_found("room type", room_type_id));
        }

        let plan_ids: Vec<(i64,)> = sqlx::query_as(&format!(
            "SELECT id FROM {} WHERE room_type_id = ? AND is_deleted = 0 ORDER BY id ASC",
            tables.plans
        ))
        .bind(room_type_id.as_i64())
        .fetch_all(&mut *tx)
        .await?;

        let update_plan = format!(
            "UPDATE {} SET is_stop_sales = ?, updated_at = ? WHERE id = ? AND is_deleted = 0",
            tables.plans
        );
        for (plan_id,) in &plan_ids {
            let result = sqlx::query(&update_plan)
                .bind(is_stop_sales)
                .bind(now)
                .bind(*plan_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() != 1 {
                return Err(LedgerError::not_found("plan", plan_id));
            }
        }

        let stocks_updated = match stock_scope {
            Some(scope) => {
                update_stock_stop_sales_in(
                    &mut tx,
                    channel,
                    &[room_type_id.as_i64()],
                    scope,
                    is_stop_sales,
                )
                .await?
            }
            None => 0,
        };

        tx.commit().await?;

        let outcome = RoomStopSalesOutcome {
            plans_updated: plan_ids.len(),
            stocks_updated,
        };
        info!(
            channel = %channel,
            room_type_id = %room_type_id,
            state = ?SalesState::from_stop_flag(is_stop_sales),
            plans = outcome.plans_updated,
            stocks = outcome.stocks_updated,
            "Room stop-sales set"
        );
        Ok(outcome)
    }

    /// Stop or resume one plan.
    ///
    /// Resuming a plan whose room is stopped also resumes the room when no
    /// other live plan of that room is still stopped.
    ///
    /// # Errors
    /// `NotFound` when the plan or its room does not exist.
    pub async fn set_plan_stop_sales(
        &self,
        channel: Wholesaler,
        plan_id: PlanId,
        is_stop_sales: bool,
    ) -> Result<PlanStopSalesOutcome, LedgerError> {
        let tables = channel.tables();
        let now = now_ms();
        let mut tx = self.pool.begin().await?;

        let plan = fetch_plan(&mut tx, channel, plan_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("plan", plan_id))?;

        sqlx::query(&format!(
            "UPDATE {} SET is_stop_sales = ?, updated_at = ? WHERE id = ?",
            tables.plans
        ))
        .bind(is_stop_sales)
        .bind(now)
        .bind(plan_id.as_i64())
        .execute(&mut *tx)
        .await?;

        let mut outcome = PlanStopSalesOutcome::default();
        if !is_stop_sales {
            let room = fetch_room(&mut tx, channel, plan.room_type_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("room type", plan.room_type_id))?;

            if SalesState::from_stop_flag(room.is_stop_sales).is_stopped() {
                let (still_stopped,): (i64,) = sqlx::query_as(&format!(
                    "SELECT COUNT(*) FROM {} WHERE room_type_id = ? AND id != ? AND is_deleted = 0 AND is_stop_sales = 1",
                    tables.plans
                ))
                .bind(room.id.as_i64())
                .bind(plan_id.as_i64())
                .fetch_one(&mut *tx)
                .await?;

                if still_stopped == 0 {
                    sqlx::query(&format!(
                        "UPDATE {} SET is_stop_sales = 0, updated_at = ? WHERE id = ?",
                        tables.room_types
                    ))
                    .bind(now)
                    .bind(room.id.as_i64())
                    .execute(&mut *tx)
                    .await?;
                    outcome.room_reopened = true;
                }
            }
        }

        tx.commit().await?;

        info!(
            channel = %channel,
            plan_id = %plan_id,
            state = ?SalesState::from_stop_flag(is_stop_sales),
            room_reopened = outcome.room_reopened,
            "Plan stop-sales set"
        );
        Ok(outcome)
    }
}
