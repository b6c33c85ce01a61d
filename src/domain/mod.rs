//! Domain types for the room inventory and price ledger.
//!
//! This module provides:
//! - Identifiers and the `UseDate` ledger key
//! - Wholesaler channels and their table mapping
//! - Room types, plans and child-rate configuration
//! - Stock and price records, bookings, cancellation policies

pub mod booking;
pub mod cancel_policy;
pub mod channel;
pub mod plan;
pub mod price;
pub mod primitives;
pub mod room;
pub mod sales_state;
pub mod stock;

pub use booking::{Booking, BookingCount, CountScope, NewBooking};
pub use cancel_policy::{CancelPolicy, CancelWindow};
pub use channel::{ChannelTables, UnknownWholesaler, Wholesaler};
pub use plan::{
    ChildRate, ChildRateCategory, ChildRateTable, ChildTier, NewPlanGroup, Plan, TaxCategory,
};
pub use price::{PriceRecord, RateTypeCode, TaxedAmount};
pub use primitives::{
    BookingId, CancelPolicyId, DateParseError, PlanGroupId, PlanId, PropertyId, RoomTypeId,
    UseDate,
};
pub use room::{NewRoomType, RoomType, StockWindow};
pub use sales_state::SalesState;
pub use stock::{DateScope, StockRecord};
