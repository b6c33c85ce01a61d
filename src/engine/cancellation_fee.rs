//! Suggested cancellation fee from a time-windowed penalty policy.

use crate::domain::CancelPolicy;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Everything the fee depends on, gathered from the booking and its plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationInput<'a> {
    pub policy: &'a CancelPolicy,
    pub total_paid_in_tax: i64,
    pub is_non_refundable: bool,
    pub is_cancelled: bool,
}

/// Fee to suggest when cancelling at `now`.
///
/// Already-cancelled bookings cost nothing, non-refundable fares forfeit the
/// whole amount, otherwise the first policy window containing `now` decides
/// the percentage and the result is rounded up to the next yen.
pub fn suggest_fee(input: &CancellationInput<'_>, now: DateTime<Utc>) -> i64 {
    if input.is_cancelled {
        return 0;
    }
    if input.is_non_refundable {
        return input.total_paid_in_tax;
    }

    match input.policy.matching_window(now) {
        Some(window) => {
            let fee = Decimal::from(input.total_paid_in_tax) * window.percent
                / Decimal::ONE_HUNDRED;
            fee.ceil().max(Decimal::ZERO).to_i64().unwrap_or(0)
        }
        None => 0,
    }
}
