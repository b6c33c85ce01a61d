use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::{parse_channel, AppState};
use crate::db::repo::{PlanStopSalesOutcome, RoomStopSalesOutcome};
use crate::domain::{DateScope, PlanId, RoomTypeId};
use crate::error::AppError;

/// Which stock rows follow a room's stop-sales change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StockScopeParam {
    All,
    Future,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStopSalesBody {
    pub is_stop_sales: bool,
    pub stock_scope: Option<StockScopeParam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStopSalesBody {
    pub is_stop_sales: bool,
}

pub async fn put_room_stop_sales(
    Path((channel, room_type_id)): Path<(String, i64)>,
    State(state): State<AppState>,
    Json(body): Json<RoomStopSalesBody>,
) -> Result<Json<RoomStopSalesOutcome>, AppError> {
    let channel = parse_channel(&channel)?;
    let scope = body.stock_scope.map(|scope| match scope {
        StockScopeParam::All => DateScope::AllDates,
        StockScopeParam::Future => DateScope::From(state.config.today()),
    });

    let outcome = state
        .repo
        .set_room_stop_sales(channel, RoomTypeId::new(room_type_id), body.is_stop_sales, scope)
        .await?;
    Ok(Json(outcome))
}

pub async fn put_plan_stop_sales(
    Path((channel, plan_id)): Path<(String, i64)>,
    State(state): State<AppState>,
    Json(body): Json<PlanStopSalesBody>,
) -> Result<Json<PlanStopSalesOutcome>, AppError> {
    let channel = parse_channel(&channel)?;
    let outcome = state
        .repo
        .set_plan_stop_sales(channel, PlanId::new(plan_id), body.is_stop_sales)
        .await?;
    Ok(Json(outcome))
}
