//! Domain primitives: entity identifiers and the calendar date used as a ledger key.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                $name(id)
            }

            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a hotel property.
    PropertyId
);
id_type!(
    /// Identifier of a room type within one channel.
    RoomTypeId
);
id_type!(
    /// Identifier of a plan within one channel.
    PlanId
);
id_type!(
    /// Identifier shared by plans created together.
    PlanGroupId
);
id_type!(BookingId);
id_type!(CancelPolicyId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid date {0:?}, expected YYYY-MM-DD")]
pub struct DateParseError(pub String);

/// A stay date. Always `YYYY-MM-DD` at the boundary and in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UseDate(NaiveDate);

impl UseDate {
    pub const FORMAT: &'static str = "%Y-%m-%d";
    pub const MAX: UseDate = UseDate(NaiveDate::MAX);

    pub fn new(date: NaiveDate) -> Self {
        UseDate(date)
    }

    /// Build from calendar components; `None` for an impossible date.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(UseDate)
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// `None` when the result falls outside the representable calendar.
    pub fn add_days(&self, days: i64) -> Option<Self> {
        self.0.checked_add_signed(Duration::days(days)).map(UseDate)
    }

    /// Inclusive iterator over `self..=end`. Empty when `end < self`.
    pub fn iter_through(self, end: UseDate) -> impl Iterator<Item = UseDate> {
        let days = (end.0 - self.0).num_days();
        (0..=days).map_while(move |offset| self.add_days(offset))
    }

    /// Storage/wire representation.
    pub fn to_db_string(&self) -> String {
        self.0.format(Self::FORMAT).to_string()
    }
}

impl FromStr for UseDate {
    type Err = DateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), Self::FORMAT)
            .map(UseDate)
            .map_err(|_| DateParseError(s.to_string()))
    }
}

impl fmt::Display for UseDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

impl Serialize for UseDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_db_string())
    }
}

impl<'de> Deserialize<'de> for UseDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        UseDate::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// Validate an inclusive date range.
pub fn ensure_ordered(start: UseDate, end: UseDate) -> Result<(), (UseDate, UseDate)> {
    if start > end {
        Err((start, end))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_date_round_trips_through_string() {
        let date = UseDate::from_str("2024-06-01").unwrap();
        assert_eq!(date.to_string(), "2024-06-01");
        assert_eq!(date, UseDate::from_ymd(2024, 6, 1).unwrap());
    }

    #[test]
    fn test_use_date_rejects_garbage() {
        assert!(UseDate::from_str("2024/06/01").is_err());
        assert!(UseDate::from_str("2024-02-30").is_err());
    }

    #[test]
    fn test_iter_through_is_inclusive() {
        let start = UseDate::from_ymd(2024, 2, 28).unwrap();
        let end = UseDate::from_ymd(2024, 3, 1).unwrap();
        let days: Vec<String> = start.iter_through(end).map(|d| d.to_string()).collect();
        assert_eq!(days, vec!["2024-02-28", "2024-02-29", "2024-03-01"]);
        assert_eq!(end.iter_through(start).count(), 0);
    }

    #[test]
    fn test_add_days_at_calendar_edge() {
        let date = UseDate::from_ymd(2024, 12, 31).unwrap();
        assert_eq!(date.add_days(1), UseDate::from_ymd(2025, 1, 1));
        assert_eq!(date.add_days(-366), UseDate::from_ymd(2023, 12, 31));
        assert_eq!(UseDate::MAX.add_days(1), None);
        assert_eq!(UseDate::MAX.iter_through(UseDate::MAX).count(), 1);
    }

    #[test]
    fn test_use_date_serializes_as_string() {
        let date = UseDate::from_ymd(2024, 6, 1).unwrap();
        assert_eq!(serde_json::to_string(&date).unwrap(), "\"2024-06-01\"");
        let back: UseDate = serde_json::from_str("\"2024-06-01\"").unwrap();
        assert_eq!(back, date);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(RoomTypeId::new(42).to_string(), "42");
        assert_eq!(serde_json::to_string(&PlanId::new(7)).unwrap(), "7");
    }
}
