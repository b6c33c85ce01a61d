//! Request-driven workflows spanning the ledgers and the booking source.

pub mod calendar;
pub mod cancellation;
pub mod reconcile;

pub use calendar::{
    CalendarAggregator, CalendarConfig, CalendarError, CalendarFetch, CalendarReport,
    CalendarWarning,
};
pub use cancellation::{CancellationQuote, CancellationService};
pub use reconcile::{reconcile_booking_counts, ReconcileError};
