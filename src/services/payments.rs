//! Payment round-trip: hand a booking to the gateway, then reconcile the
//! signed verdict it posts back.

use std::sync::Arc;

use anyhow::Context;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, GatewayCallback, PaymentInitiation, PaymentOutcome, PaymentStatus};
use crate::services::gateway::Payer;
use crate::services::ledger;
use crate::services::notification::{self, EmailMessage};
use crate::state::AppState;

/// Signs a payment request for `booking_id`. Authenticated callers only
/// see their own bookings; anonymous callers may pay any guest booking.
pub fn initiate(
    state: &AppState,
    booking_id: &str,
    caller_id: Option<&str>,
) -> Result<PaymentInitiation, AppError> {
    let (booking, payer) = {
        let conn = state.db()?;
        let booking = ledger::begin_payment_attempt(&conn, booking_id, caller_id)?;
        let payer = resolve_payer(&conn, &booking)?;
        (booking, payer)
    };

    let txn_id = booking
        .gateway_txn_id
        .as_deref()
        .context("transaction id missing after payment attempt was opened")?;

    if !state.gateway.is_configured() {
        tracing::warn!(booking_id, "payment gateway credentials are not configured");
    }

    let initiation = state.gateway.payment_request(&booking, &payer, txn_id);
    tracing::info!(
        booking_id,
        txn_id,
        amount = %initiation.payment_data.amount,
        "payment initiated"
    );
    Ok(initiation)
}

fn resolve_payer(conn: &Connection, booking: &Booking) -> Result<Payer, AppError> {
    if let Some(owner_id) = &booking.owner_id {
        if let Some(user) = queries::get_user(conn, owner_id)? {
            return Ok(Payer {
                first_name: user.name,
                email: user.email,
                phone: user.phone.unwrap_or_default(),
            });
        }
    }

    Ok(Payer {
        first_name: booking
            .traveler_details
            .first()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "Guest".to_string()),
        email: booking.email.clone().unwrap_or_default(),
        phone: booking.phone.clone().unwrap_or_default(),
    })
}

/// Applies a gateway callback. Only a bad signature or a callback that does
/// not belong to the booking is an error; a declined payment is a normal
/// outcome with `success = false`.
pub async fn verify(
    state: &Arc<AppState>,
    callback: GatewayCallback,
) -> Result<PaymentOutcome, AppError> {
    state.gateway.verify_callback(&callback)?;

    let booking_id = callback.booking_id().to_string();
    if booking_id.is_empty() {
        return Err(AppError::Validation(
            "callback carries no booking id".to_string(),
        ));
    }

    let verdict = if callback.is_success() {
        PaymentStatus::Success
    } else {
        PaymentStatus::Failed
    };

    let update = {
        let conn = state.db()?;
        let booking = queries::get_booking(&conn, &booking_id)?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        if let Some(expected) = booking.gateway_txn_id.as_deref() {
            if expected != callback.txnid {
                tracing::warn!(
                    booking_id = %booking_id,
                    expected,
                    received = %callback.txnid,
                    "callback transaction id does not match booking"
                );
                return Err(AppError::Security(
                    "transaction does not match booking".to_string(),
                ));
            }
        }

        ledger::update_payment_status(
            &conn,
            &booking_id,
            verdict,
            Some(callback.mihpayid.as_str()),
            Some(callback.txnid.as_str()),
        )?
    };

    if update.confirmed {
        spawn_confirmation(Arc::clone(state), update.booking.clone());
    }

    Ok(PaymentOutcome {
        success: update.booking.payment_status == PaymentStatus::Success,
        booking_id,
        transaction_id: callback.txnid,
        gateway_payment_id: callback.mihpayid,
    })
}

/// Fire-and-forget: a failed email never touches the payment result.
fn spawn_confirmation(state: Arc<AppState>, booking: Booking) {
    tokio::spawn(async move {
        if let Err(e) = send_confirmation(&state, &booking).await {
            tracing::error!(
                booking_id = %booking.id,
                error = %e,
                "failed to send booking confirmation"
            );
        }
    });
}

async fn send_confirmation(state: &AppState, booking: &Booking) -> anyhow::Result<()> {
    let Some(message) = confirmation_message(state, booking)? else {
        tracing::info!(booking_id = %booking.id, "no email on file, skipping confirmation");
        return Ok(());
    };
    state.email.send_email(&message).await
}

fn confirmation_message(state: &AppState, booking: &Booking) -> anyhow::Result<Option<EmailMessage>> {
    let conn = state.db()?;
    let product = queries::get_product(&conn, &booking.product_id)?
        .context("booked product no longer exists")?;
    let payer = resolve_payer(&conn, booking)?;

    if payer.email.is_empty() {
        return Ok(None);
    }
    Ok(Some(notification::booking_confirmation(
        &payer.email,
        &payer.first_name,
        booking,
        &product,
        &state.config.frontend_url,
    )))
}
