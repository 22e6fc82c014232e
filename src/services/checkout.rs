//! Turns a cart, a guest item list, or a single direct request into
//! bookings.
//!
//! Multi-item checkout is not one transaction. Items are booked in order
//! and a failure stops the loop, leaving earlier bookings in place and the
//! cart untouched. Cart lines remember which booking they produced, so a
//! retry picks up where the failed attempt stopped.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, Product, TravelerDetail};
use crate::services::ledger::{self, NewBooking};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[serde(alias = "tourId")]
    #[validate(length(min = 1, message = "productId is required"))]
    pub product_id: String,
    #[validate(range(min = 1, message = "at least one traveler is required"))]
    pub number_of_travelers: u32,
    pub travel_date: NaiveDate,
    #[serde(default)]
    #[validate(nested)]
    pub traveler_details: Vec<TravelerDetail>,
    pub special_requests: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    #[validate(nested)]
    pub traveler_details: Vec<TravelerDetail>,
    pub special_requests: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GuestItem {
    #[serde(alias = "tourId")]
    #[validate(length(min = 1, message = "productId is required"))]
    pub product_id: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
    pub travel_date: NaiveDate,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GuestCheckoutRequest {
    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<GuestItem>,
    #[serde(default)]
    #[validate(nested)]
    pub traveler_details: Vec<TravelerDetail>,
    pub special_requests: Option<String>,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    pub bookings: Vec<String>,
    pub total_amount: Decimal,
    pub message: String,
}

/// Re-reads the product and applies the per-item business rules.
fn check_item(
    conn: &Connection,
    product_id: &str,
    quantity: u32,
    travel_date: NaiveDate,
    today: NaiveDate,
) -> Result<Product, AppError> {
    let product = queries::get_product(conn, product_id)?;
    let product = match product {
        Some(p) if p.is_active => p,
        Some(p) => {
            return Err(AppError::Validation(format!(
                "Tour {} is no longer available",
                p.title
            )))
        }
        None => {
            return Err(AppError::Validation(format!(
                "Tour not found or inactive: {product_id}"
            )))
        }
    };

    if travel_date <= today {
        return Err(AppError::Validation(format!(
            "{}: Travel date must be in the future",
            product.title
        )));
    }
    if quantity > product.max_group_size {
        return Err(AppError::Validation(format!(
            "{}: Maximum group size is {}",
            product.title, product.max_group_size
        )));
    }
    Ok(product)
}

/// First `quantity` traveler records. Short lists are kept as they are.
pub fn assign_travelers(details: &[TravelerDetail], quantity: u32) -> Vec<TravelerDetail> {
    details.iter().take(quantity as usize).cloned().collect()
}

pub fn direct_booking(
    conn: &Connection,
    user_id: &str,
    req: CreateBookingRequest,
    today: NaiveDate,
) -> Result<Booking, AppError> {
    req.validate()?;
    check_item(conn, &req.product_id, req.number_of_travelers, req.travel_date, today)?;

    ledger::create_booking(
        conn,
        NewBooking {
            owner_id: Some(user_id.to_string()),
            traveler_details: assign_travelers(&req.traveler_details, req.number_of_travelers),
            product_id: req.product_id,
            number_of_travelers: req.number_of_travelers,
            travel_date: req.travel_date,
            special_requests: req.special_requests,
            email: req.email,
            phone: req.phone,
            is_guest: false,
            cart_line_id: None,
        },
    )
}

pub fn checkout_cart(
    conn: &Connection,
    user_id: &str,
    req: CheckoutRequest,
    today: NaiveDate,
) -> Result<CheckoutResult, AppError> {
    req.validate()?;

    let cart = queries::get_cart(conn, user_id)?
        .filter(|cart| !cart.items.is_empty())
        .ok_or_else(|| AppError::Validation("Cart is empty".to_string()))?;

    let mut bookings = Vec::with_capacity(cart.items.len());
    let mut total_amount = Decimal::ZERO;
    let mut resumed = 0;

    for item in &cart.items {
        if let Some(existing) = queries::find_cart_line_booking(conn, user_id, &item.line_id)? {
            total_amount += existing.total_amount;
            bookings.push(existing.id);
            resumed += 1;
            continue;
        }

        check_item(conn, &item.product_id, item.quantity, item.travel_date, today)?;
        let booking = ledger::create_booking(
            conn,
            NewBooking {
                owner_id: Some(user_id.to_string()),
                product_id: item.product_id.clone(),
                number_of_travelers: item.quantity,
                travel_date: item.travel_date,
                traveler_details: assign_travelers(&req.traveler_details, item.quantity),
                special_requests: req.special_requests.clone(),
                email: req.email.clone(),
                phone: req.phone.clone(),
                is_guest: false,
                cart_line_id: Some(item.line_id.clone()),
            },
        )?;
        total_amount += booking.total_amount;
        bookings.push(booking.id);
    }

    queries::save_cart_items(conn, user_id, &[], &Utc::now())?;
    tracing::info!(
        user_id,
        bookings = bookings.len(),
        resumed,
        total = %total_amount,
        "cart checked out"
    );

    Ok(CheckoutResult {
        bookings,
        total_amount,
        message: "Bookings created successfully".to_string(),
    })
}

pub fn guest_checkout(
    conn: &Connection,
    req: GuestCheckoutRequest,
    today: NaiveDate,
) -> Result<CheckoutResult, AppError> {
    req.validate()?;

    let mut bookings = Vec::with_capacity(req.items.len());
    let mut total_amount = Decimal::ZERO;

    for item in &req.items {
        check_item(conn, &item.product_id, item.quantity, item.travel_date, today)?;
        let booking = ledger::create_booking(
            conn,
            NewBooking {
                owner_id: None,
                product_id: item.product_id.clone(),
                number_of_travelers: item.quantity,
                travel_date: item.travel_date,
                traveler_details: assign_travelers(&req.traveler_details, item.quantity),
                special_requests: req.special_requests.clone(),
                email: Some(req.email.clone()),
                phone: Some(req.phone.clone()),
                is_guest: true,
                cart_line_id: None,
            },
        )?;
        total_amount += booking.total_amount;
        bookings.push(booking.id);
    }

    tracing::info!(bookings = bookings.len(), total = %total_amount, "guest checkout");

    Ok(CheckoutResult {
        bookings,
        total_amount,
        message: "Guest bookings created successfully".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::CartItem;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2029, 6, 1).unwrap()
    }

    fn later(days: u64) -> NaiveDate {
        today() + chrono::Days::new(days)
    }

    fn product(id: &str, price: i64, active: bool) -> Product {
        Product {
            id: id.to_string(),
            title: format!("Tour {id}"),
            price: Decimal::from(price),
            max_group_size: 4,
            is_active: active,
            total_bookings: 0,
        }
    }

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::save_product(&conn, &product("kedarnath", 10000, true)).unwrap();
        queries::save_product(&conn, &product("badrinath", 8000, true)).unwrap();
        conn
    }

    fn line(line_id: &str, product_id: &str, quantity: u32) -> CartItem {
        CartItem {
            line_id: line_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            travel_date: later(30),
            price_snapshot: Decimal::from(1),
            added_at: Utc::now(),
        }
    }

    fn traveler(name: &str) -> TravelerDetail {
        TravelerDetail {
            name: name.to_string(),
            age: 30,
            gender: "F".to_string(),
            id_proof: "ID".to_string(),
        }
    }

    fn checkout_request() -> CheckoutRequest {
        CheckoutRequest {
            traveler_details: vec![traveler("A"), traveler("B"), traveler("C")],
            special_requests: None,
            email: None,
            phone: None,
        }
    }

    fn booking_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM bookings", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_cart_checkout_reprices_and_clears() {
        let conn = setup_db();
        queries::save_cart_items(
            &conn,
            "user-1",
            &[line("l1", "kedarnath", 2), line("l2", "badrinath", 1)],
            &Utc::now(),
        )
        .unwrap();

        let result = checkout_cart(&conn, "user-1", checkout_request(), today()).unwrap();
        assert_eq!(result.bookings.len(), 2);
        // current catalog price, not the stale snapshot
        assert_eq!(result.total_amount, Decimal::from(28000));

        let cart = queries::get_cart(&conn, "user-1").unwrap().unwrap();
        assert!(cart.items.is_empty());
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let conn = setup_db();
        let err = checkout_cart(&conn, "user-1", checkout_request(), today()).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Cart is empty"));
    }

    #[test]
    fn test_partial_failure_keeps_earlier_bookings_and_cart() {
        let conn = setup_db();
        queries::save_product(&conn, &product("closed", 5000, false)).unwrap();
        let items = [line("l1", "kedarnath", 2), line("l2", "closed", 1)];
        queries::save_cart_items(&conn, "user-1", &items, &Utc::now()).unwrap();

        let err = checkout_cart(&conn, "user-1", checkout_request(), today()).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("Tour closed")));
        assert_eq!(booking_count(&conn), 1);
        let cart = queries::get_cart(&conn, "user-1").unwrap().unwrap();
        assert_eq!(cart.items.len(), 2);

        // Dropping the failing line and retrying does not book the first line again
        queries::save_cart_items(&conn, "user-1", &items[..1], &Utc::now()).unwrap();
        let result = checkout_cart(&conn, "user-1", checkout_request(), today()).unwrap();
        assert_eq!(result.bookings.len(), 1);
        assert_eq!(result.total_amount, Decimal::from(20000));
        assert_eq!(booking_count(&conn), 1);
    }

    #[test]
    fn test_travel_date_must_be_strictly_future() {
        let conn = setup_db();
        let mut item = line("l1", "kedarnath", 1);
        item.travel_date = today();
        queries::save_cart_items(&conn, "user-1", &[item], &Utc::now()).unwrap();

        let err = checkout_cart(&conn, "user-1", checkout_request(), today()).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("future")));
        assert_eq!(booking_count(&conn), 0);
    }

    #[test]
    fn test_traveler_details_truncate_without_padding() {
        let conn = setup_db();
        queries::save_cart_items(
            &conn,
            "user-1",
            &[line("l1", "kedarnath", 2), line("l2", "badrinath", 4)],
            &Utc::now(),
        )
        .unwrap();

        let result = checkout_cart(&conn, "user-1", checkout_request(), today()).unwrap();
        let first = queries::get_booking(&conn, &result.bookings[0]).unwrap().unwrap();
        let second = queries::get_booking(&conn, &result.bookings[1]).unwrap().unwrap();
        assert_eq!(first.traveler_details.len(), 2);
        assert_eq!(first.traveler_details[1].name, "B");
        // four travelers, three details supplied
        assert_eq!(second.traveler_details.len(), 3);
    }

    #[test]
    fn test_guest_checkout_stamps_contact() {
        let conn = setup_db();
        let req = GuestCheckoutRequest {
            items: vec![GuestItem {
                product_id: "badrinath".to_string(),
                quantity: 2,
                travel_date: later(10),
            }],
            traveler_details: vec![traveler("A")],
            special_requests: Some("vegetarian meals".to_string()),
            email: "guest@example.com".to_string(),
            phone: "9876543210".to_string(),
        };

        let result = guest_checkout(&conn, req, today()).unwrap();
        assert_eq!(result.total_amount, Decimal::from(16000));
        let booking = queries::get_booking(&conn, &result.bookings[0]).unwrap().unwrap();
        assert!(booking.is_guest);
        assert!(booking.owner_id.is_none());
        assert_eq!(booking.email.as_deref(), Some("guest@example.com"));
        assert_eq!(booking.special_requests.as_deref(), Some("vegetarian meals"));
    }

    #[test]
    fn test_guest_checkout_requires_valid_email() {
        let conn = setup_db();
        let req = GuestCheckoutRequest {
            items: vec![GuestItem {
                product_id: "badrinath".to_string(),
                quantity: 1,
                travel_date: later(10),
            }],
            traveler_details: vec![],
            special_requests: None,
            email: "not-an-email".to_string(),
            phone: "1".to_string(),
        };
        assert!(matches!(
            guest_checkout(&conn, req, today()).unwrap_err(),
            AppError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_direct_booking_group_size() {
        let conn = setup_db();
        let req = CreateBookingRequest {
            product_id: "kedarnath".to_string(),
            number_of_travelers: 5,
            travel_date: later(5),
            traveler_details: vec![],
            special_requests: None,
            email: None,
            phone: None,
        };
        let err = direct_booking(&conn, "user-1", req, today()).unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("Maximum group size is 4")));
    }
}
