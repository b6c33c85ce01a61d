use crate::db::{LedgerError, Repository};
use crate::domain::{BookingId, CancelPolicy, Wholesaler};
use crate::engine::cancellation_fee::{suggest_fee, CancellationInput};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationQuote {
    pub booking_id: BookingId,
    pub total_price_in_tax: i64,
    pub cancellation_fee: i64,
}

/// Loads a booking, its plan and the plan's policy, then prices the cancellation.
#[derive(Clone)]
pub struct CancellationService {
    repo: Arc<Repository>,
}

impl CancellationService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Suggested fee for cancelling `booking_id` at `now`.
    ///
    /// A plan without a policy, or a plan that no longer exists, prices with an
    /// empty policy.
    pub async fn suggest(
        &self,
        channel: Wholesaler,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<CancellationQuote, LedgerError> {
        let booking = self
            .repo
            .get_booking(channel, booking_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("booking", booking_id))?;

        let policy_id = self
            .repo
            .get_plan(channel, booking.plan_id)
            .await?
            .and_then(|plan| plan.cancel_policy_id);
        let policy = match policy_id {
            Some(id) => self.repo.get_cancel_policy(id).await?.unwrap_or_default(),
            None => CancelPolicy::default(),
        };

        let fee = suggest_fee(
            &CancellationInput {
                policy: &policy,
                total_paid_in_tax: booking.total_price_in_tax,
                is_non_refundable: booking.is_non_refundable,
                is_cancelled: booking.is_cancelled,
            },
            now,
        );

        tracing::debug!(channel = %channel, booking_id = %booking_id, fee, "Cancellation fee suggested");
        Ok(CancellationQuote {
            booking_id,
            total_price_in_tax: booking.total_price_in_tax,
            cancellation_fee: fee,
        })
    }
}
