use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;

use crate::api::{parse_channel, AppState};
use crate::domain::BookingId;
use crate::error::AppError;
use crate::orchestration::CancellationQuote;

pub async fn get_cancellation_fee(
    Path((channel, booking_id)): Path<(String, i64)>,
    State(state): State<AppState>,
) -> Result<Json<CancellationQuote>, AppError> {
    let channel = parse_channel(&channel)?;
    let quote = state
        .cancellation
        .suggest(channel, BookingId::new(booking_id), Utc::now())
        .await?;
    Ok(Json(quote))
}
