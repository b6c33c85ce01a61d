//! Bookings, as written by the booking system and read by the ledger.

use crate::domain::{Booking, BookingId, NewBooking, PlanId, PropertyId, RoomTypeId, UseDate, Wholesaler};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{ensure_range, now_ms, parse_stored_date, LedgerError, Repository};

const BOOKING_COLUMNS: &str = "id, property_id, plan_id, room_type_id, check_in_date, \
     check_out_date, total_price_in_tax, is_non_refundable, is_cancelled";

fn booking_from_row(table: &str, row: &SqliteRow) -> Result<Booking, LedgerError> {
    let check_in: String = row.get("check_in_date");
    let check_out: String = row.get("check_out_date");
    Ok(Booking {
        id: BookingId::new(row.get("id")),
        property_id: PropertyId::new(row.get("property_id")),
        plan_id: PlanId::new(row.get("plan_id")),
        room_type_id: RoomTypeId::new(row.get("room_type_id")),
        check_in: parse_stored_date(table, &check_in)?,
        check_out: parse_stored_date(table, &check_out)?,
        total_price_in_tax: row.get("total_price_in_tax"),
        is_non_refundable: row.get("is_non_refundable"),
        is_cancelled: row.get("is_cancelled"),
    })
}

impl Repository {
    /// # Errors
    /// `InvalidRange` when check-out is not after check-in.
    pub async fn insert_booking(
        &self,
        channel: Wholesaler,
        booking: NewBooking,
    ) -> Result<Booking, LedgerError> {
        if booking.check_out <= booking.check_in {
            return Err(LedgerError::InvalidRange {
                start: booking.check_in,
                end: booking.check_out,
            });
        }
        let now = now_ms();
        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {} (
                property_id, plan_id, room_type_id, check_in_date, check_out_date,
                total_price_in_tax, is_non_refundable, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            channel.tables().bookings
        ))
        .bind(booking.property_id.as_i64())
        .bind(booking.plan_id.as_i64())
        .bind(booking.room_type_id.as_i64())
        .bind(booking.check_in.to_db_string())
        .bind(booking.check_out.to_db_string())
        .bind(booking.total_price_in_tax)
        .bind(booking.is_non_refundable)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Booking {
            id: BookingId::new(result.last_insert_rowid()),
            property_id: booking.property_id,
            plan_id: booking.plan_id,
            room_type_id: booking.room_type_id,
            check_in: booking.check_in,
            check_out: booking.check_out,
            total_price_in_tax: booking.total_price_in_tax,
            is_non_refundable: booking.is_non_refundable,
            is_cancelled: false,
        })
    }

    /// Mark a booking cancelled. Returns false when it does not exist.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn cancel_booking(
        &self,
        channel: Wholesaler,
        booking_id: BookingId,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET is_cancelled = 1, updated_at = ? WHERE id = ?",
            channel.tables().bookings
        ))
        .bind(now_ms())
        .bind(booking_id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_booking(
        &self,
        channel: Wholesaler,
        booking_id: BookingId,
    ) -> Result<Option<Booking>, LedgerError> {
        let table = channel.tables().bookings;
        let sql = format!("SELECT {} FROM {} WHERE id = ?", BOOKING_COLUMNS, table);
        sqlx::query(&sql)
            .bind(booking_id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| booking_from_row(&table, &row))
            .transpose()
    }

    /// Non-cancelled bookings of a property with at least one night in `[start, end]`.
    ///
    /// # Errors
    /// `InvalidRange` when `start > end`, otherwise query errors.
    pub async fn query_active_bookings(
        &self,
        channel: Wholesaler,
        property_id: PropertyId,
        start: UseDate,
        end: UseDate,
    ) -> Result<Vec<Booking>, LedgerError> {
        ensure_range(start, end)?;
        let table = channel.tables().bookings;
        let sql = format!(
            r#"
            SELECT {} FROM {}
            WHERE property_id = ? AND is_cancelled = 0 AND check_in_date <= ? AND check_out_date > ?
            ORDER BY id ASC
            "#,
            BOOKING_COLUMNS, table
        );
        let rows = sqlx::query(&sql)
            .bind(property_id.as_i64())
            .bind(end.to_db_string())
            .bind(start.to_db_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| booking_from_row(&table, row)).collect()
    }
}
