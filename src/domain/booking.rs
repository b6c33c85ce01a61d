//! Bookings as seen by the ledger, and the per-date counts derived from them.

use crate::domain::{BookingId, PlanId, PropertyId, RoomTypeId, UseDate};
use serde::{Deserialize, Serialize};

/// A reservation written by the booking system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub property_id: PropertyId,
    pub plan_id: PlanId,
    pub room_type_id: RoomTypeId,
    pub check_in: UseDate,
    /// Exclusive: the guest does not occupy the room that night.
    pub check_out: UseDate,
    pub total_price_in_tax: i64,
    pub is_non_refundable: bool,
    pub is_cancelled: bool,
}

impl Booking {
    /// Nights occupied, `[check_in, check_out)`, clipped to `[start, end]`.
    pub fn nights_within(&self, start: UseDate, end: UseDate) -> impl Iterator<Item = UseDate> {
        let first = self.check_in.max(start);
        self.check_out
            .add_days(-1)
            .into_iter()
            .flat_map(move |last| first.iter_through(last.min(end)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub property_id: PropertyId,
    pub plan_id: PlanId,
    pub room_type_id: RoomTypeId,
    pub check_in: UseDate,
    pub check_out: UseDate,
    pub total_price_in_tax: i64,
    pub is_non_refundable: bool,
}

/// What a [`BookingCount`] is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountScope {
    Plan,
    Room,
}

/// Non-cancelled bookings for one plan or room on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCount {
    /// Plan id or room type id, depending on the requested scope.
    pub target_id: i64,
    pub use_date: UseDate,
    pub count: i64,
}
