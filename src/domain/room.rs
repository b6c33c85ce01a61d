//! Room types and their stock-setting window.

use crate::domain::{PropertyId, RoomTypeId, UseDate};
use serde::{Deserialize, Serialize};

/// Dates for which a room type keeps stock rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StockWindow {
    /// Rolling horizon starting today.
    YearRound,
    /// Explicit inclusive range.
    Range { start: UseDate, end: UseDate },
}

impl StockWindow {
    /// Dates from `today` covered by this window.
    ///
    /// `horizon_days` bounds the year-round window; an explicit range is clipped
    /// so that no past date is regenerated.
    pub fn dates_from(&self, today: UseDate, horizon_days: u32) -> Vec<UseDate> {
        match *self {
            StockWindow::YearRound => {
                if horizon_days == 0 {
                    return Vec::new();
                }
                let last = today
                    .add_days(i64::from(horizon_days) - 1)
                    .unwrap_or(UseDate::MAX);
                today.iter_through(last).collect()
            }
            StockWindow::Range { start, end } => {
                let start = start.max(today);
                start.iter_through(end).collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomType {
    pub id: RoomTypeId,
    pub property_id: PropertyId,
    pub code: String,
    pub name: String,
    /// Capacity applied to every date of the stock window.
    pub room_count: i64,
    pub min_occupancy: u32,
    pub max_occupancy: u32,
    pub is_stop_sales: bool,
    pub stock_window: StockWindow,
}

/// Input for registering a room type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoomType {
    pub property_id: PropertyId,
    pub code: String,
    pub name: String,
    pub room_count: i64,
    pub min_occupancy: u32,
    pub max_occupancy: u32,
    pub stock_window: StockWindow,
}
