pub mod calendar;
pub mod cancellation;
pub mod health;
pub mod inventory;
pub mod stocks;
pub mod stop_sales;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::Wholesaler;
use crate::error::AppError;
use crate::orchestration::{CalendarAggregator, CancellationService};
use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub calendar: Arc<CalendarAggregator>,
    pub cancellation: Arc<CancellationService>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, calendar: Arc<CalendarAggregator>) -> Self {
        Self {
            cancellation: Arc::new(CancellationService::new(repo.clone())),
            repo,
            config,
            calendar,
        }
    }
}

/// Parse the `:channel` path segment.
pub(crate) fn parse_channel(raw: &str) -> Result<Wholesaler, AppError> {
    raw.parse::<Wholesaler>()
        .map_err(|e| AppError::NotFound(e.to_string()))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/:channel/properties/:property_id/calendar",
            get(calendar::get_calendar),
        )
        .route("/v1/:channel/stocks", get(stocks::get_stocks))
        .route(
            "/v1/:channel/room-types/:id/inventory",
            put(inventory::put_room_inventory),
        )
        .route(
            "/v1/:channel/room-types/:id/stop-sales",
            put(stop_sales::put_room_stop_sales),
        )
        .route(
            "/v1/:channel/plans/:id/stop-sales",
            put(stop_sales::put_plan_stop_sales),
        )
        .route(
            "/v1/:channel/bookings/:id/cancellation-fee",
            get(cancellation::get_cancellation_fee),
        )
        .layer(cors)
        .with_state(state)
}
