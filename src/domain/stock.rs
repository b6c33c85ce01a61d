//! Per-date stock record of a room type.

use crate::domain::{RoomTypeId, UseDate};
use serde::{Deserialize, Serialize};

/// One `(room_type_id, use_date)` row of the stock ledger.
///
/// `stock` is always `room_count - booking_count` once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub room_type_id: RoomTypeId,
    pub use_date: UseDate,
    pub room_count: i64,
    pub booking_count: i64,
    pub stock: i64,
    pub is_stop_sales: bool,
}

impl StockRecord {
    /// A fresh row for a date with no bookings yet.
    pub fn new(room_type_id: RoomTypeId, use_date: UseDate, room_count: i64) -> Self {
        Self {
            room_type_id,
            use_date,
            room_count,
            booking_count: 0,
            stock: room_count,
            is_stop_sales: false,
        }
    }

    pub fn with_stop_sales(mut self, is_stop_sales: bool) -> Self {
        self.is_stop_sales = is_stop_sales;
        self
    }

    pub fn key(&self) -> (RoomTypeId, UseDate) {
        (self.room_type_id, self.use_date)
    }

    /// Available quantity for a capacity and an authoritative booking count.
    pub fn derive_stock(room_count: i64, booking_count: i64) -> i64 {
        room_count - booking_count
    }

    pub fn is_consistent(&self) -> bool {
        self.stock == Self::derive_stock(self.room_count, self.booking_count)
    }
}

/// Which dates a stock-level stop-sales change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateScope {
    AllDates,
    On(UseDate),
    From(UseDate),
}
