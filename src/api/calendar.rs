use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::{parse_channel, AppState};
use crate::domain::{PropertyId, UseDate};
use crate::error::AppError;
use crate::orchestration::CalendarReport;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarQuery {
    pub base_date: Option<String>,
}

pub async fn get_calendar(
    Path((channel, property_id)): Path<(String, i64)>,
    Query(params): Query<CalendarQuery>,
    State(state): State<AppState>,
) -> Result<Json<CalendarReport>, AppError> {
    let channel = parse_channel(&channel)?;
    let base_date = match params.base_date.as_deref() {
        Some(raw) => raw
            .parse::<UseDate>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => state.config.today(),
    };

    let report = state
        .calendar
        .build(channel, PropertyId::new(property_id), base_date)
        .await?;
    Ok(Json(report))
}
