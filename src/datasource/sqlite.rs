//! Booking counts aggregated from a channel's own bookings table.

use super::{BookingSource, DataSourceError};
use crate::db::Repository;
use crate::domain::{Booking, BookingCount, CountScope, PropertyId, UseDate, Wholesaler};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Expand bookings into per-night counts clipped to `[start, end]`.
///
/// A booking occupies every night in `[check_in, check_out)`. Cancelled
/// bookings are ignored.
pub fn count_nights(
    bookings: &[Booking],
    scope: CountScope,
    start: UseDate,
    end: UseDate,
) -> Vec<BookingCount> {
    let mut counts: BTreeMap<(i64, UseDate), i64> = BTreeMap::new();
    for booking in bookings.iter().filter(|b| !b.is_cancelled) {
        let target_id = match scope {
            CountScope::Plan => booking.plan_id.as_i64(),
            CountScope::Room => booking.room_type_id.as_i64(),
        };
        for night in booking.nights_within(start, end) {
            *counts.entry((target_id, night)).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .map(|((target_id, use_date), count)| BookingCount {
            target_id,
            use_date,
            count,
        })
        .collect()
}

#[derive(Clone)]
pub struct SqliteBookingSource {
    repo: Arc<Repository>,
}

impl SqliteBookingSource {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

impl std::fmt::Debug for SqliteBookingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBookingSource").finish_non_exhaustive()
    }
}

#[async_trait]
impl BookingSource for SqliteBookingSource {
    async fn fetch_booking_counts(
        &self,
        channel: Wholesaler,
        scope: CountScope,
        property_id: PropertyId,
        start: UseDate,
        end: UseDate,
    ) -> Result<Vec<BookingCount>, DataSourceError> {
        let bookings = self
            .repo
            .query_active_bookings(channel, property_id, start, end)
            .await
            .map_err(|e| DataSourceError::Database(e.to_string()))?;
        Ok(count_nights(&bookings, scope, start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{BookingId, NewBooking, PlanId, RoomTypeId};
    use tempfile::TempDir;

    fn d(s: &str) -> UseDate {
        s.parse().unwrap()
    }

    fn booking(plan: i64, room: i64, check_in: &str, check_out: &str) -> Booking {
        Booking {
            id: BookingId::new(1),
            property_id: PropertyId::new(1),
            plan_id: PlanId::new(plan),
            room_type_id: RoomTypeId::new(room),
            check_in: d(check_in),
            check_out: d(check_out),
            total_price_in_tax: 0,
            is_non_refundable: false,
            is_cancelled: false,
        }
    }

    #[test]
    fn test_count_nights_by_scope() {
        let bookings = vec![
            booking(10, 1, "2024-06-01", "2024-06-03"),
            booking(11, 1, "2024-06-02", "2024-06-03"),
        ];

        let by_room = count_nights(&bookings, CountScope::Room, d("2024-06-01"), d("2024-06-30"));
        let rendered: Vec<(i64, String, i64)> = by_room
            .iter()
            .map(|c| (c.target_id, c.use_date.to_string(), c.count))
            .collect();
        assert_eq!(
            rendered,
            vec![(1, "2024-06-01".to_string(), 1), (1, "2024-06-02".to_string(), 2)]
        );

        let by_plan = count_nights(&bookings, CountScope::Plan, d("2024-06-02"), d("2024-06-02"));
        assert_eq!(by_plan.len(), 2);
        assert!(by_plan.iter().all(|c| c.count == 1));
    }

    #[test]
    fn test_count_nights_skips_cancelled() {
        let mut cancelled = booking(10, 1, "2024-06-01", "2024-06-02");
        cancelled.is_cancelled = true;
        assert!(count_nights(&[cancelled], CountScope::Plan, d("2024-06-01"), d("2024-06-30")).is_empty());
    }

    #[test]
    fn test_count_nights_clips_long_stays_to_window() {
        let long_stay = booking(10, 1, "1900-01-01", "9999-12-31");
        let counts = count_nights(&[long_stay], CountScope::Room, d("2024-06-01"), d("2024-06-03"));
        let dates: Vec<String> = counts.iter().map(|c| c.use_date.to_string()).collect();
        assert_eq!(dates, vec!["2024-06-01", "2024-06-02", "2024-06-03"]);

        let checks_out_first = booking(10, 1, "2024-05-30", "2024-06-02");
        let counts = count_nights(&[checks_out_first], CountScope::Room, d("2024-06-01"), d("2024-06-30"));
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].use_date, d("2024-06-01"));
    }

    #[tokio::test]
    async fn test_sqlite_source_reads_channel_bookings() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let repo = Arc::new(Repository::new(init_db(&db_path).await.unwrap()));
        repo.insert_booking(
            Wholesaler::Neppan,
            NewBooking {
                property_id: PropertyId::new(1),
                plan_id: PlanId::new(3),
                room_type_id: RoomTypeId::new(2),
                check_in: d("2024-06-01"),
                check_out: d("2024-06-02"),
                total_price_in_tax: 11000,
                is_non_refundable: false,
            },
        )
        .await
        .unwrap();

        let source = SqliteBookingSource::new(repo);
        let counts = source
            .fetch_booking_counts(Wholesaler::Neppan, CountScope::Plan, PropertyId::new(1), d("2024-06-01"), d("2024-06-15"))
            .await
            .unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].target_id, 3);

        let other_channel = source
            .fetch_booking_counts(Wholesaler::Tl, CountScope::Plan, PropertyId::new(1), d("2024-06-01"), d("2024-06-15"))
            .await
            .unwrap();
        assert!(other_channel.is_empty());
    }
}
