//! Pure computation: pricing, cancellation fees, calendar join.

pub mod calendar;
pub mod cancellation_fee;
pub mod child_price;

pub use calendar::{
    join_calendar, CalendarSources, CalendarStock, DayPrices, OccupancyPrice, PlanCalendar,
    RoomCalendar,
};
pub use cancellation_fee::{suggest_fee, CancellationInput};
pub use child_price::{build_price_rows, AdultPriceInput};
