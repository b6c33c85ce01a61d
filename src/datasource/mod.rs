//! Booking-count sources consulted by the calendar and by stock reconciliation.

use crate::domain::{BookingCount, CountScope, PropertyId, UseDate, Wholesaler};
use async_trait::async_trait;
use std::fmt;

pub mod mock;
pub mod sqlite;

pub use mock::MockBookingSource;
pub use sqlite::{count_nights, SqliteBookingSource};

/// Supplier of confirmed (non-cancelled) booking counts per night.
#[async_trait]
pub trait BookingSource: Send + Sync + fmt::Debug {
    /// Count bookings per target and night for one channel.
    ///
    /// # Arguments
    /// * `channel` - Wholesaler whose bookings are counted
    /// * `scope` - Whether `target_id` is a plan id or a room type id
    /// * `property_id` - Property the bookings belong to
    /// * `start` - First night (inclusive)
    /// * `end` - Last night (inclusive)
    ///
    /// # Returns
    /// One entry per `(target_id, use_date)` with a non-zero count, ordered by
    /// target then date.
    async fn fetch_booking_counts(
        &self,
        channel: Wholesaler,
        scope: CountScope,
        property_id: PropertyId,
        start: UseDate,
        end: UseDate,
    ) -> Result<Vec<BookingCount>, DataSourceError>;
}

/// Error type for booking-count sources.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// The backing store failed
    Database(String),
    /// The source is not reachable or refused the request
    Unavailable(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::Database(msg) => write!(f, "Database error: {}", msg),
            DataSourceError::Unavailable(msg) => write!(f, "Source unavailable: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}
