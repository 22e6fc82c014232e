//! Booking ledger: the only writer of booking rows.
//!
//! Every status change goes through here so the lifecycle rules hold no
//! matter which route triggered it:
//! - `total_amount` is computed once at creation and never rewritten
//! - a successful payment is final; later callbacks are no-ops
//! - confirmation and the catalog booking counter move together, once

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, ErrorCode};
use rust_decimal::Decimal;

use crate::db::queries::{self, BookingFilter};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, PaymentStatus, TravelerDetail};
use crate::services::ids;

const REFERENCE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub owner_id: Option<String>,
    pub product_id: String,
    pub number_of_travelers: u32,
    pub travel_date: NaiveDate,
    pub traveler_details: Vec<TravelerDetail>,
    pub special_requests: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_guest: bool,
    pub cart_line_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub booking: Booking,
    /// False when the call was an idempotent no-op.
    pub transitioned: bool,
    /// True when this call moved the booking into `Confirmed`.
    pub confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

pub fn create_booking(conn: &Connection, new: NewBooking) -> Result<Booking, AppError> {
    let product = queries::get_product(conn, &new.product_id)?
        .filter(|p| p.is_active)
        .ok_or_else(|| {
            AppError::Validation(format!("Tour {} not found or inactive", new.product_id))
        })?;

    if new.number_of_travelers == 0 {
        return Err(AppError::Validation(
            "At least one traveler is required".to_string(),
        ));
    }
    if new.number_of_travelers > product.max_group_size {
        return Err(AppError::Validation(format!(
            "{}: Maximum group size is {}",
            product.title, product.max_group_size
        )));
    }

    let now = Utc::now();
    let mut booking = Booking {
        id: ids::booking_id(),
        booking_reference: ids::booking_reference(),
        owner_id: new.owner_id,
        product_id: product.id,
        number_of_travelers: new.number_of_travelers,
        travel_date: new.travel_date,
        total_amount: product.price * Decimal::from(new.number_of_travelers),
        traveler_details: new.traveler_details,
        special_requests: new.special_requests,
        email: new.email,
        phone: new.phone,
        is_guest: new.is_guest,
        booking_status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        gateway_txn_id: None,
        gateway_payment_id: None,
        cancelled_at: None,
        cancellation_reason: None,
        cart_line_id: new.cart_line_id,
        created_at: now,
        updated_at: now,
    };

    for attempt in 1..=REFERENCE_ATTEMPTS {
        match queries::insert_booking(conn, &booking) {
            Ok(()) => {
                tracing::info!(
                    booking_id = %booking.id,
                    reference = %booking.booking_reference,
                    amount = %booking.total_amount,
                    guest = booking.is_guest,
                    "booking created"
                );
                return Ok(booking);
            }
            Err(e) if is_unique_violation(&e, "booking_reference") => {
                tracing::warn!(attempt, "booking reference collision, regenerating");
                booking.booking_reference = ids::booking_reference();
            }
            Err(e) if is_unique_violation(&e, "cart_line_id") => {
                return Err(AppError::Conflict(
                    "cart line already converted to a booking".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Internal(anyhow::anyhow!(
        "could not allocate a unique booking reference"
    )))
}

fn is_unique_violation(err: &anyhow::Error, column: &str) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, Some(msg))) => {
            e.code == ErrorCode::ConstraintViolation && msg.contains(column)
        }
        _ => false,
    }
}

/// Records a gateway verdict. A booking that is already paid is returned
/// untouched, whatever the new status.
pub fn update_payment_status(
    conn: &Connection,
    booking_id: &str,
    new_status: PaymentStatus,
    gateway_payment_id: Option<&str>,
    gateway_txn_id: Option<&str>,
) -> Result<PaymentUpdate, AppError> {
    let tx = conn.unchecked_transaction()?;

    let current = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if current.payment_status == PaymentStatus::Success {
        if new_status != PaymentStatus::Success {
            tracing::warn!(
                booking_id,
                status = new_status.as_str(),
                "ignoring payment status change on a paid booking"
            );
        }
        return Ok(PaymentUpdate {
            booking: current,
            transitioned: false,
            confirmed: false,
        });
    }

    let now = Utc::now();
    let changed = queries::set_payment_status(
        &tx,
        booking_id,
        new_status,
        non_empty(gateway_payment_id),
        non_empty(gateway_txn_id),
        &now,
    )?;

    let paid = changed && new_status == PaymentStatus::Success;
    let confirmed = paid && !current.booking_status.is_terminal();
    if confirmed {
        queries::increment_product_bookings(&tx, &current.product_id)?;
    } else if paid {
        tracing::warn!(
            booking_id,
            booking_status = current.booking_status.as_str(),
            "payment captured for a closed booking, left unconfirmed"
        );
    }

    let booking = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
    tx.commit()?;

    tracing::info!(
        booking_id,
        payment_status = booking.payment_status.as_str(),
        booking_status = booking.booking_status.as_str(),
        "payment status updated"
    );

    Ok(PaymentUpdate {
        booking,
        transitioned: changed,
        confirmed,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Prepares a booking for a gateway round-trip.
///
/// Mints and stores a transaction id the first time, and reuses it on
/// every later attempt. A declined payment is reopened to pending.
pub fn begin_payment_attempt(
    conn: &Connection,
    booking_id: &str,
    owner_id: Option<&str>,
) -> Result<Booking, AppError> {
    let tx = conn.unchecked_transaction()?;

    let booking = match owner_id {
        Some(owner) => queries::get_booking_for_owner(&tx, booking_id, owner)?,
        None => queries::get_booking(&tx, booking_id)?,
    }
    .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.payment_status == PaymentStatus::Success {
        return Err(AppError::Conflict("Payment already completed".to_string()));
    }
    if booking.booking_status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Booking is {}",
            booking.booking_status.as_str()
        )));
    }

    let now = Utc::now();
    if booking.gateway_txn_id.is_none() {
        let txn_id = ids::transaction_id();
        queries::attach_transaction_id(&tx, booking_id, &txn_id, &now)?;
        tracing::info!(booking_id, txn_id = %txn_id, "transaction id assigned");
    }
    if booking.payment_status == PaymentStatus::Failed {
        queries::reopen_failed_payment(&tx, booking_id, &now)?;
        tracing::info!(booking_id, "retrying declined payment");
    }

    let booking = queries::get_booking(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
    tx.commit()?;
    Ok(booking)
}

pub fn cancel(
    conn: &Connection,
    booking_id: &str,
    owner_id: &str,
    reason: &str,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking_for_owner(conn, booking_id, owner_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    match booking.booking_status {
        BookingStatus::Cancelled => {
            return Err(AppError::Conflict("Booking already cancelled".to_string()))
        }
        BookingStatus::Completed => {
            return Err(AppError::Conflict(
                "Cannot cancel completed booking".to_string(),
            ))
        }
        BookingStatus::Pending | BookingStatus::Confirmed => {}
    }

    if !queries::cancel_booking(conn, booking_id, reason, &Utc::now())? {
        return Err(AppError::Conflict(
            "Booking changed state concurrently".to_string(),
        ));
    }
    tracing::info!(booking_id, reason, "booking cancelled");

    queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

/// Administrative lifecycle change. Completion requires a confirmed
/// booking; cancellation follows the same guard as [`cancel`].
pub fn set_booking_status(
    conn: &Connection,
    booking_id: &str,
    status: BookingStatus,
) -> Result<Booking, AppError> {
    let booking = queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.booking_status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Booking is already {}",
            booking.booking_status.as_str()
        )));
    }

    let now = Utc::now();
    let changed = match status {
        BookingStatus::Cancelled => {
            queries::cancel_booking(conn, booking_id, "cancelled by admin", &now)?
        }
        BookingStatus::Completed if booking.booking_status != BookingStatus::Confirmed => {
            return Err(AppError::Conflict(
                "Only confirmed bookings can be completed".to_string(),
            ))
        }
        BookingStatus::Confirmed if booking.payment_status != PaymentStatus::Success => {
            return Err(AppError::Conflict(
                "Booking cannot be confirmed before payment".to_string(),
            ))
        }
        _ => queries::set_booking_status(conn, booking_id, status, &now)?,
    };

    if !changed {
        return Err(AppError::Conflict(
            "Booking changed state concurrently".to_string(),
        ));
    }
    tracing::info!(booking_id, status = status.as_str(), "booking status set");

    queries::get_booking(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

pub fn get_for_owner(conn: &Connection, booking_id: &str, owner_id: &str) -> Result<Booking, AppError> {
    queries::get_booking_for_owner(conn, booking_id, owner_id)?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

pub fn list(
    conn: &Connection,
    filter: &BookingFilter,
    page: i64,
    limit: i64,
) -> Result<Page<Booking>, AppError> {
    if page < 1 || limit < 1 {
        return Err(AppError::Validation(
            "page and limit must be positive".to_string(),
        ));
    }
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::Validation("page out of range".to_string()))?;

    let (items, total) = queries::list_bookings(conn, filter, limit, offset)?;
    Ok(Page {
        items,
        total,
        page,
        total_pages: (total + limit - 1) / limit,
    })
}
