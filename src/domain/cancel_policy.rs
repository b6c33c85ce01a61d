//! Time-windowed cancellation penalty policy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` window; `end == None` is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelWindow {
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub percent: Decimal,
}

impl CancelWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && self.end.map_or(true, |end| at < end)
    }
}

/// Ordered penalty windows. At most one is expected to match a given instant;
/// when several do, the first one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CancelPolicy {
    pub windows: Vec<CancelWindow>,
}

impl CancelPolicy {
    pub fn new(windows: Vec<CancelWindow>) -> Self {
        Self { windows }
    }

    pub fn matching_window(&self, at: DateTime<Utc>) -> Option<&CancelWindow> {
        self.windows.iter().find(|w| w.contains(at))
    }
}
