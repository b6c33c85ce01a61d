use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_channel, AppState};
use crate::domain::{RoomTypeId, StockRecord, UseDate};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StocksQuery {
    /// Comma-separated room type ids.
    pub room_type_ids: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StocksResponse {
    pub from: UseDate,
    pub to: UseDate,
    pub stocks: Vec<StockRecord>,
}

fn parse_room_ids(raw: &str) -> Result<Vec<RoomTypeId>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map(RoomTypeId::new)
                .map_err(|_| AppError::BadRequest(format!("Invalid room type id: {}", s)))
        })
        .collect()
}

fn parse_date(raw: Option<&str>, field: &str) -> Result<Option<UseDate>, AppError> {
    raw.map(|s| {
        s.parse::<UseDate>()
            .map_err(|e| AppError::BadRequest(format!("{}: {}", field, e)))
    })
    .transpose()
}

pub async fn get_stocks(
    Path(channel): Path<String>,
    Query(params): Query<StocksQuery>,
    State(state): State<AppState>,
) -> Result<Json<StocksResponse>, AppError> {
    let channel = parse_channel(&channel)?;
    let room_type_ids = parse_room_ids(&params.room_type_ids)?;
    if room_type_ids.is_empty() {
        return Err(AppError::BadRequest("roomTypeIds must not be empty".into()));
    }

    let from = parse_date(params.from.as_deref(), "from")?.unwrap_or_else(|| state.config.today());
    let to = match parse_date(params.to.as_deref(), "to")? {
        Some(to) => to,
        None => from
            .add_days(i64::from(state.config.calendar_window_days.max(1)) - 1)
            .ok_or_else(|| AppError::BadRequest(format!("from: {} leaves no room for a window", from)))?,
    };

    let stocks = state
        .repo
        .query_stocks_in_range(channel, &room_type_ids, from, to)
        .await?;

    Ok(Json(StocksResponse { from, to, stocks }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_room_ids() {
        let ids = parse_room_ids("1, 2,,3").unwrap();
        assert_eq!(ids, vec![RoomTypeId::new(1), RoomTypeId::new(2), RoomTypeId::new(3)]);
        assert!(parse_room_ids("1,x").is_err());
    }
}
