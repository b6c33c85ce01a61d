use crate::datasource::{BookingSource, DataSourceError};
use crate::db::{LedgerError, Repository};
use crate::domain::{CountScope, PropertyId, RoomTypeId, UseDate, Wholesaler};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Source(#[from] DataSourceError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Pull room-scoped booking counts for a property and write them into its stock rows.
///
/// Returns the number of stock rows whose booking count changed.
pub async fn reconcile_booking_counts(
    repo: &Repository,
    source: &dyn BookingSource,
    channel: Wholesaler,
    property_id: PropertyId,
    start: UseDate,
    end: UseDate,
) -> Result<usize, ReconcileError> {
    let room_ids: Vec<RoomTypeId> = repo
        .query_room_types(channel, property_id)
        .await?
        .into_iter()
        .map(|room| room.id)
        .collect();
    if room_ids.is_empty() {
        return Ok(0);
    }

    let counts = source
        .fetch_booking_counts(channel, CountScope::Room, property_id, start, end)
        .await?;
    let changed = repo
        .sync_booking_counts(channel, &room_ids, start, end, &counts)
        .await?;

    tracing::info!(
        channel = %channel,
        property_id = %property_id,
        rooms = room_ids.len(),
        counts = counts.len(),
        changed,
        "Stock reconciled against bookings"
    );
    Ok(changed)
}
