use crate::config::{Config, FetchFailurePolicy};
use crate::datasource::BookingSource;
use crate::db::Repository;
use crate::domain::{CountScope, PropertyId, UseDate, Wholesaler};
use crate::engine::calendar::{join_calendar, CalendarSources, RoomCalendar};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarConfig {
    pub window_days: u32,
    pub fetch_timeout: Option<Duration>,
    pub failure_policy: FetchFailurePolicy,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            window_days: 15,
            fetch_timeout: None,
            failure_policy: FetchFailurePolicy::Degrade,
        }
    }
}

impl From<&Config> for CalendarConfig {
    fn from(config: &Config) -> Self {
        Self {
            window_days: config.calendar_window_days,
            fetch_timeout: config.calendar_fetch_timeout,
            failure_policy: config.calendar_failure_policy,
        }
    }
}

/// The five concurrent reads behind a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CalendarFetch {
    Rooms,
    Plans,
    Stocks,
    Prices,
    BookingCounts,
}

impl fmt::Display for CalendarFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalendarFetch::Rooms => "rooms",
            CalendarFetch::Plans => "plans",
            CalendarFetch::Stocks => "stocks",
            CalendarFetch::Prices => "prices",
            CalendarFetch::BookingCounts => "booking counts",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error)]
pub enum CalendarError {
    #[error("{fetch} fetch failed: {message}")]
    Source { fetch: CalendarFetch, message: String },
    #[error("{0} fetch timed out")]
    Timeout(CalendarFetch),
    #[error("calendar window from {base_date} runs past the last supported date")]
    WindowOutOfRange { base_date: UseDate },
}

impl CalendarError {
    /// The fetch that failed, if any.
    pub fn fetch(&self) -> Option<CalendarFetch> {
        match self {
            CalendarError::Source { fetch, .. } | CalendarError::Timeout(fetch) => Some(*fetch),
            CalendarError::WindowOutOfRange { .. } => None,
        }
    }
}

/// A fetch that failed but was tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarWarning {
    pub source: CalendarFetch,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarReport {
    pub base_date: UseDate,
    pub end_date: UseDate,
    pub rooms: Vec<RoomCalendar>,
    pub warnings: Vec<CalendarWarning>,
}

async fn run_fetch<T, F>(
    fetch: CalendarFetch,
    timeout: Option<Duration>,
    fut: F,
) -> Result<T, CalendarError>
where
    F: Future<Output = Result<T, String>>,
{
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| CalendarError::Timeout(fetch))?,
        None => fut.await,
    };
    result.map_err(|message| CalendarError::Source { fetch, message })
}

#[derive(Clone)]
pub struct CalendarAggregator {
    repo: Arc<Repository>,
    bookings: Arc<dyn BookingSource>,
    config: CalendarConfig,
}

impl CalendarAggregator {
    pub fn new(
        repo: Arc<Repository>,
        bookings: Arc<dyn BookingSource>,
        config: CalendarConfig,
    ) -> Self {
        Self {
            repo,
            bookings,
            config,
        }
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    /// Build the calendar of a property for `window_days` days from `base_date`.
    ///
    /// Rooms, plans, stock rows, price rows and plan-scoped booking counts are
    /// fetched concurrently and joined once all five have settled.
    pub async fn build(
        &self,
        channel: Wholesaler,
        property_id: PropertyId,
        base_date: UseDate,
    ) -> Result<CalendarReport, CalendarError> {
        let end_date = base_date
            .add_days(i64::from(self.config.window_days.max(1)) - 1)
            .ok_or(CalendarError::WindowOutOfRange { base_date })?;
        let timeout = self.config.fetch_timeout;
        let repo = &self.repo;

        let rooms = run_fetch(CalendarFetch::Rooms, timeout, async {
            repo.query_room_types(channel, property_id)
                .await
                .map_err(|e| e.to_string())
        });
        let plans = run_fetch(CalendarFetch::Plans, timeout, async {
            repo.query_plans(channel, property_id)
                .await
                .map_err(|e| e.to_string())
        });
        let stocks = run_fetch(CalendarFetch::Stocks, timeout, async {
            repo.query_property_stocks(channel, property_id, base_date, end_date)
                .await
                .map_err(|e| e.to_string())
        });
        let prices = run_fetch(CalendarFetch::Prices, timeout, async {
            repo.query_property_prices(channel, property_id, base_date, end_date)
                .await
                .map_err(|e| e.to_string())
        });
        let booking_counts = run_fetch(CalendarFetch::BookingCounts, timeout, async {
            self.bookings
                .fetch_booking_counts(channel, CountScope::Plan, property_id, base_date, end_date)
                .await
                .map_err(|e| e.to_string())
        });

        let (rooms, plans, stocks, prices, booking_counts) =
            futures::join!(rooms, plans, stocks, prices, booking_counts);

        let mut warnings = Vec::new();
        let sources = CalendarSources {
            rooms: self.settle(rooms, &mut warnings)?,
            plans: self.settle(plans, &mut warnings)?,
            stocks: self.settle(stocks, &mut warnings)?,
            prices: self.settle(prices, &mut warnings)?,
            booking_counts: self.settle(booking_counts, &mut warnings)?,
        };
        let rooms = join_calendar(sources);

        info!(
            channel = %channel,
            property_id = %property_id,
            base_date = %base_date,
            rooms = rooms.len(),
            warnings = warnings.len(),
            "Calendar built"
        );

        Ok(CalendarReport {
            base_date,
            end_date,
            rooms,
            warnings,
        })
    }

    fn settle<T: Default>(
        &self,
        result: Result<T, CalendarError>,
        warnings: &mut Vec<CalendarWarning>,
    ) -> Result<T, CalendarError> {
        match (result, self.config.failure_policy) {
            (Ok(value), _) => Ok(value),
            (Err(err), FetchFailurePolicy::Fail) => Err(err),
            (Err(err), FetchFailurePolicy::Degrade) => match err.fetch() {
                Some(source) => {
                    warn!(source = %source, error = %err, "Calendar source degraded to empty");
                    warnings.push(CalendarWarning {
                        source,
                        message: err.to_string(),
                    });
                    Ok(T::default())
                }
                None => Err(err),
            },
        }
    }
}
