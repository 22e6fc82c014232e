use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Cart, CartItem};

/// Goods and services tax applied on top of the cart subtotal (5%).
fn gst_rate() -> Decimal {
    Decimal::new(5, 2)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[serde(alias = "tourId")]
    #[validate(length(min = 1, message = "productId is required"))]
    pub product_id: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    pub travel_date: NaiveDate,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<u32>,
    pub travel_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub version: i64,
    pub total: Decimal,
    pub item_count: u32,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self {
            total: cart.subtotal(),
            item_count: cart.item_count(),
            version: cart.version,
            items: cart.items,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub gst: Decimal,
    pub total: Decimal,
    pub item_count: u32,
}

fn load(conn: &Connection, user_id: &str) -> Result<Cart, AppError> {
    Ok(queries::get_cart(conn, user_id)?.unwrap_or_else(|| Cart::empty(user_id)))
}

fn store(conn: &Connection, mut cart: Cart) -> Result<CartView, AppError> {
    cart.version = queries::save_cart_items(conn, &cart.user_id, &cart.items, &Utc::now())?;
    Ok(cart.into())
}

fn new_line_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn check_future(travel_date: NaiveDate, today: NaiveDate) -> Result<(), AppError> {
    if travel_date <= today {
        return Err(AppError::Validation(
            "Travel date must be in the future".to_string(),
        ));
    }
    Ok(())
}

pub fn get(conn: &Connection, user_id: &str) -> Result<CartView, AppError> {
    Ok(load(conn, user_id)?.into())
}

pub fn totals(conn: &Connection, user_id: &str) -> Result<CartTotals, AppError> {
    let cart = load(conn, user_id)?;
    let subtotal = cart.subtotal();
    let gst = (subtotal * gst_rate()).round_dp(2);
    Ok(CartTotals {
        subtotal,
        gst,
        total: subtotal + gst,
        item_count: cart.item_count(),
    })
}

/// Adds a line, or replaces the existing line for the same product.
pub fn add_item(
    conn: &Connection,
    user_id: &str,
    req: AddToCartRequest,
    today: NaiveDate,
) -> Result<CartView, AppError> {
    req.validate()?;
    let product = queries::get_product(conn, &req.product_id)?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Tour not found or not available".to_string()))?;
    check_future(req.travel_date, today)?;

    let mut cart = load(conn, user_id)?;
    let line = CartItem {
        line_id: new_line_id(),
        product_id: product.id,
        quantity: req.quantity,
        travel_date: req.travel_date,
        price_snapshot: product.price,
        added_at: Utc::now(),
    };

    match cart
        .items
        .iter_mut()
        .find(|item| item.product_id == line.product_id)
    {
        Some(existing) => {
            existing.line_id = line.line_id;
            existing.quantity = line.quantity;
            existing.travel_date = line.travel_date;
            existing.price_snapshot = line.price_snapshot;
        }
        None => cart.items.push(line),
    }

    store(conn, cart)
}

pub fn update_item(
    conn: &Connection,
    user_id: &str,
    index: usize,
    req: UpdateCartItemRequest,
    today: NaiveDate,
) -> Result<CartView, AppError> {
    req.validate()?;
    let mut cart = queries::get_cart(conn, user_id)?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;
    let item = cart
        .items
        .get_mut(index)
        .ok_or_else(|| AppError::Validation("Invalid item index".to_string()))?;

    if let Some(travel_date) = req.travel_date {
        check_future(travel_date, today)?;
        item.travel_date = travel_date;
    }
    if let Some(quantity) = req.quantity {
        item.quantity = quantity;
    }
    item.line_id = new_line_id();

    store(conn, cart)
}

pub fn remove_item(conn: &Connection, user_id: &str, index: usize) -> Result<CartView, AppError> {
    let mut cart = queries::get_cart(conn, user_id)?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;
    if index >= cart.items.len() {
        return Err(AppError::Validation("Invalid item index".to_string()));
    }
    cart.items.remove(index);
    store(conn, cart)
}

pub fn clear(conn: &Connection, user_id: &str) -> Result<(), AppError> {
    queries::save_cart_items(conn, user_id, &[], &Utc::now())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::Product;
    use std::str::FromStr;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2029, 6, 1).unwrap()
    }

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::save_product(
            &conn,
            &Product {
                id: "rishikesh".to_string(),
                title: "Rishikesh Retreat".to_string(),
                price: Decimal::from_str("4999.50").unwrap(),
                max_group_size: 8,
                is_active: true,
                total_bookings: 0,
            },
        )
        .unwrap();
        conn
    }

    fn add(quantity: u32, day: u32) -> AddToCartRequest {
        AddToCartRequest {
            product_id: "rishikesh".to_string(),
            quantity,
            travel_date: NaiveDate::from_ymd_opt(2029, 7, day).unwrap(),
        }
    }

    #[test]
    fn test_add_replaces_line_for_same_product() {
        let conn = setup_db();
        let first = add_item(&conn, "u1", add(2, 1), today()).unwrap();
        let second = add_item(&conn, "u1", add(3, 5), today()).unwrap();

        assert_eq!(second.items.len(), 1);
        assert_eq!(second.item_count, 3);
        assert_ne!(first.items[0].line_id, second.items[0].line_id);
        assert!(second.version > first.version);
    }

    #[test]
    fn test_totals_include_gst() {
        let conn = setup_db();
        add_item(&conn, "u1", add(2, 1), today()).unwrap();
        let totals = totals(&conn, "u1").unwrap();
        assert_eq!(totals.subtotal, Decimal::from(9999));
        assert_eq!(totals.gst, Decimal::from_str("499.95").unwrap());
        assert_eq!(totals.total, Decimal::from_str("10498.95").unwrap());
    }

    #[test]
    fn test_add_rejects_past_date_and_unknown_product() {
        let conn = setup_db();
        let mut past = add(1, 1);
        past.travel_date = today();
        assert!(matches!(
            add_item(&conn, "u1", past, today()).unwrap_err(),
            AppError::Validation(_)
        ));

        let mut unknown = add(1, 1);
        unknown.product_id = "nowhere".to_string();
        assert!(matches!(
            add_item(&conn, "u1", unknown, today()).unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_update_and_remove_by_index() {
        let conn = setup_db();
        let added = add_item(&conn, "u1", add(2, 1), today()).unwrap();

        let updated = update_item(
            &conn,
            "u1",
            0,
            UpdateCartItemRequest {
                quantity: Some(4),
                travel_date: None,
            },
            today(),
        )
        .unwrap();
        assert_eq!(updated.items[0].quantity, 4);
        assert_ne!(updated.items[0].line_id, added.items[0].line_id);

        assert!(matches!(
            remove_item(&conn, "u1", 3).unwrap_err(),
            AppError::Validation(_)
        ));
        let removed = remove_item(&conn, "u1", 0).unwrap();
        assert!(removed.items.is_empty());
    }

    #[test]
    fn test_missing_cart_reads_as_empty() {
        let conn = setup_db();
        let view = get(&conn, "nobody").unwrap();
        assert!(view.items.is_empty());
        assert_eq!(view.total, Decimal::ZERO);
        assert!(matches!(
            remove_item(&conn, "nobody", 0).unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
