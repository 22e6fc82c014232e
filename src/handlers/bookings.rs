use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{require_role, CurrentUser};
use crate::db::queries::BookingFilter;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, PaymentStatus, Role};
use crate::services::checkout::{
    self, CheckoutRequest, CheckoutResult, CreateBookingRequest, GuestCheckoutRequest,
};
use crate::services::ledger::{self, Page};
use crate::state::AppState;

const MAX_PAGE_SIZE: i64 = 100;

fn default_page() -> i64 {
    1
}

fn default_user_limit() -> i64 {
    10
}

fn default_admin_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_user_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct AdminBookingsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_admin_limit")]
    pub limit: i64,
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPage {
    pub bookings: Vec<Booking>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

impl From<Page<Booking>> for BookingPage {
    fn from(page: Page<Booking>) -> Self {
        Self {
            bookings: page.items,
            total: page.total,
            page: page.page,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

fn clamp_paging(page: i64, limit: i64) -> (i64, i64) {
    (page.max(1), limit.clamp(1, MAX_PAGE_SIZE))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// POST /bookings
pub async fn create(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let conn = state.db()?;
    let booking = checkout::direct_booking(&conn, &user.id, body, today())?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// POST /bookings/checkout
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResult>), AppError> {
    let conn = state.db()?;
    let result = checkout::checkout_cart(&conn, &user.id, body, today())?;
    Ok((StatusCode::CREATED, Json(result)))
}

// POST /bookings/guest-checkout
pub async fn guest_checkout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GuestCheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResult>), AppError> {
    let conn = state.db()?;
    let result = checkout::guest_checkout(&conn, body, today())?;
    Ok((StatusCode::CREATED, Json(result)))
}

// GET /bookings
pub async fn list_mine(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<BookingPage>, AppError> {
    let (page, limit) = clamp_paging(query.page, query.limit);
    let filter = BookingFilter {
        owner_id: Some(user.id),
        ..Default::default()
    };
    let conn = state.db()?;
    Ok(Json(ledger::list(&conn, &filter, page, limit)?.into()))
}

// GET /bookings/:id
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let conn = state.db()?;
    Ok(Json(ledger::get_for_owner(&conn, &id, &user.id)?))
}

// PUT /bookings/:id/cancel
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<Booking>, AppError> {
    let conn = state.db()?;
    Ok(Json(ledger::cancel(&conn, &id, &user.id, body.reason.trim())?))
}

// GET /bookings/admin/all
pub async fn admin_list(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(query): Query<AdminBookingsQuery>,
) -> Result<Json<BookingPage>, AppError> {
    require_role(&user, Role::Admin)?;

    let (page, limit) = clamp_paging(query.page, query.limit);
    let filter = BookingFilter {
        owner_id: None,
        booking_status: query.status,
        payment_status: query.payment_status,
        from_date: query.from_date,
        to_date: query.to_date,
    };
    let conn = state.db()?;
    Ok(Json(ledger::list(&conn, &filter, page, limit)?.into()))
}

// PUT /bookings/admin/:id/status
pub async fn admin_set_status(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Booking>, AppError> {
    require_role(&user, Role::Admin)?;

    let conn = state.db()?;
    Ok(Json(ledger::set_booking_status(&conn, &id, body.status)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_paging() {
        assert_eq!(clamp_paging(0, 0), (1, 1));
        assert_eq!(clamp_paging(3, 500), (3, 100));
        assert_eq!(clamp_paging(-2, 20), (1, 20));
    }
}
