//! Per-date price record of a plan and occupancy.

use crate::domain::{PlanId, UseDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Adult occupancy encoded as a numeric string, e.g. `"2"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateTypeCode(pub String);

impl RateTypeCode {
    pub fn for_occupancy(occupancy: u32) -> Self {
        RateTypeCode(occupancy.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of adults, if the code is a positive integer.
    pub fn occupancy(&self) -> Option<u32> {
        self.0.trim().parse::<u32>().ok().filter(|n| *n > 0)
    }
}

impl fmt::Display for RateTypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tax-exclusive / tax-inclusive price pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxedAmount {
    pub ex_tax: i64,
    pub in_tax: i64,
}

impl TaxedAmount {
    pub fn new(ex_tax: i64, in_tax: i64) -> Self {
        Self { ex_tax, in_tax }
    }

    pub fn scaled(&self, factor: i64) -> Self {
        Self::new(self.ex_tax * factor, self.in_tax * factor)
    }
}

/// One `(plan_id, rate_type_code, use_date)` row of the price ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub plan_id: PlanId,
    pub rate_type_code: RateTypeCode,
    pub use_date: UseDate,
    /// Adult total for the occupancy, tax excluded.
    pub price: i64,
    pub price_in_tax: i64,
    /// Indexed by `ChildTier::index`.
    pub child_prices: [TaxedAmount; 6],
    pub regular_price: i64,
}

impl PriceRecord {
    pub fn key(&self) -> (PlanId, RateTypeCode, UseDate) {
        (self.plan_id, self.rate_type_code.clone(), self.use_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_type_code_occupancy() {
        assert_eq!(RateTypeCode::for_occupancy(3).occupancy(), Some(3));
        assert_eq!(RateTypeCode("0".into()).occupancy(), None);
        assert_eq!(RateTypeCode("twin".into()).occupancy(), None);
    }
}
