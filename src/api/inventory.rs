use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::{parse_channel, AppState};
use crate::db::repo::StockUpsertOutcome;
use crate::domain::{RoomTypeId, StockWindow};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInventoryBody {
    pub room_count: i64,
    pub stock_window: StockWindow,
}

/// Set a room's capacity and window, regenerating stock over the configured horizon.
pub async fn put_room_inventory(
    Path((channel, room_type_id)): Path<(String, i64)>,
    State(state): State<AppState>,
    Json(body): Json<RoomInventoryBody>,
) -> Result<Json<StockUpsertOutcome>, AppError> {
    let channel = parse_channel(&channel)?;
    if body.room_count < 0 {
        return Err(AppError::BadRequest("roomCount must not be negative".into()));
    }
    if let StockWindow::Range { start, end } = body.stock_window {
        if start > end {
            return Err(AppError::BadRequest(format!(
                "stockWindow start {} is after end {}",
                start, end
            )));
        }
    }

    let outcome = state
        .repo
        .save_room_inventory(
            channel,
            RoomTypeId::new(room_type_id),
            body.room_count,
            body.stock_window,
            state.config.today(),
            state.config.stock_horizon_days,
        )
        .await?;
    Ok(Json(outcome))
}
