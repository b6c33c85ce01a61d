//! Mock booking source for testing without a booking system.

use super::{BookingSource, DataSourceError};
use crate::domain::{BookingCount, CountScope, PropertyId, UseDate, Wholesaler};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Mock booking source that returns predefined counts, or a configured failure.
#[derive(Debug, Clone, Default)]
pub struct MockBookingSource {
    counts: HashMap<CountScope, Vec<BookingCount>>,
    failure: Option<DataSourceError>,
    delay: Option<Duration>,
}

impl MockBookingSource {
    /// Create a new mock source with no counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a count served for `scope`.
    pub fn with_count(mut self, scope: CountScope, target_id: i64, use_date: UseDate, count: i64) -> Self {
        self.counts.entry(scope).or_default().push(BookingCount {
            target_id,
            use_date,
            count,
        });
        self
    }

    /// Fail every fetch with `error`.
    pub fn failing(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl BookingSource for MockBookingSource {
    async fn fetch_booking_counts(
        &self,
        _channel: Wholesaler,
        scope: CountScope,
        _property_id: PropertyId,
        start: UseDate,
        end: UseDate,
    ) -> Result<Vec<BookingCount>, DataSourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        Ok(self
            .counts
            .get(&scope)
            .map(|counts| {
                counts
                    .iter()
                    .filter(|c| c.use_date >= start && c.use_date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_filters_by_scope_and_window() {
        let day = |s: &str| s.parse::<UseDate>().unwrap();
        let source = MockBookingSource::new()
            .with_count(CountScope::Plan, 1, day("2024-06-01"), 2)
            .with_count(CountScope::Plan, 1, day("2024-07-01"), 1)
            .with_count(CountScope::Room, 9, day("2024-06-01"), 3);

        let counts = source
            .fetch_booking_counts(Wholesaler::Tl, CountScope::Plan, PropertyId::new(1), day("2024-06-01"), day("2024-06-15"))
            .await
            .unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].count, 2);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let source = MockBookingSource::new().failing(DataSourceError::Unavailable("down".to_string()));
        let day: UseDate = "2024-06-01".parse().unwrap();
        let result = source
            .fetch_booking_counts(Wholesaler::Tl, CountScope::Room, PropertyId::new(1), day, day)
            .await;
        assert!(matches!(result, Err(DataSourceError::Unavailable(_))));
    }
}
