use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::models::{
    Booking, BookingStatus, Cart, CartItem, PaymentStatus, Product, Role, TravelerDetail, User,
};

const BOOKING_COLUMNS: &str = "id, booking_reference, owner_id, product_id, number_of_travelers, \
     travel_date, total_amount, traveler_details, special_requests, email, phone, is_guest, \
     booking_status, payment_status, gateway_txn_id, gateway_payment_id, cancelled_at, \
     cancellation_reason, cart_line_id, created_at, updated_at";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp: {s}"))?
        .with_timezone(&Utc))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("invalid date: {s}"))
}

fn parse_decimal(s: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("invalid amount: {s}"))
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let traveler_details = serde_json::to_string(&booking.traveler_details)?;

    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
        ),
        params![
            booking.id,
            booking.booking_reference,
            booking.owner_id,
            booking.product_id,
            booking.number_of_travelers,
            booking.travel_date.format(DATE_FORMAT).to_string(),
            booking.total_amount.to_string(),
            traveler_details,
            booking.special_requests,
            booking.email,
            booking.phone,
            booking.is_guest,
            booking.booking_status.as_str(),
            booking.payment_status.as_str(),
            booking.gateway_txn_id,
            booking.gateway_payment_id,
            booking.cancelled_at.as_ref().map(format_timestamp),
            booking.cancellation_reason,
            booking.cart_line_id,
            format_timestamp(&booking.created_at),
            format_timestamp(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;
    booking.transpose()
}

pub fn get_booking_for_owner(
    conn: &Connection,
    id: &str,
    owner_id: &str,
) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1 AND owner_id = ?2"),
            params![id, owner_id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;
    booking.transpose()
}

/// The booking already produced by a given cart line, if any.
pub fn find_cart_line_booking(
    conn: &Connection,
    owner_id: &str,
    cart_line_id: &str,
) -> anyhow::Result<Option<Booking>> {
    let booking = conn
        .query_row(
            &format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE owner_id = ?1 AND cart_line_id = ?2"
            ),
            params![owner_id, cart_line_id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;
    booking.transpose()
}

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub owner_id: Option<String>,
    pub booking_status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Newest first. Returns the requested page and the total match count.
pub fn list_bookings(
    conn: &Connection,
    filter: &BookingFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<(Vec<Booking>, i64)> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(owner) = &filter.owner_id {
        clauses.push("owner_id = ?");
        params_vec.push(Box::new(owner.clone()));
    }
    if let Some(status) = filter.booking_status {
        clauses.push("booking_status = ?");
        params_vec.push(Box::new(status.as_str()));
    }
    if let Some(status) = filter.payment_status {
        clauses.push("payment_status = ?");
        params_vec.push(Box::new(status.as_str()));
    }
    if let Some(from) = filter.from_date {
        clauses.push("travel_date >= ?");
        params_vec.push(Box::new(from.format(DATE_FORMAT).to_string()));
    }
    if let Some(to) = filter.to_date {
        clauses.push("travel_date <= ?");
        params_vec.push(Box::new(to.format(DATE_FORMAT).to_string()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM bookings {where_sql}"),
        params_refs.as_slice(),
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings {where_sql}
         ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?"
    );
    let mut page_params = params_refs;
    page_params.push(&limit);
    page_params.push(&offset);

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(page_params.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok((bookings, total))
}

/// Writes a payment status unless the booking is already paid. A success
/// confirms the booking only while it is still open.
/// Returns whether a row changed.
pub fn set_payment_status(
    conn: &Connection,
    id: &str,
    status: PaymentStatus,
    gateway_payment_id: Option<&str>,
    gateway_txn_id: Option<&str>,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let confirm = status == PaymentStatus::Success;
    let count = conn.execute(
        "UPDATE bookings SET
           payment_status = ?1,
           booking_status = CASE
             WHEN ?2 AND booking_status NOT IN ('cancelled', 'completed') THEN 'confirmed'
             ELSE booking_status
           END,
           gateway_payment_id = COALESCE(?3, gateway_payment_id),
           gateway_txn_id = COALESCE(?4, gateway_txn_id),
           updated_at = ?5
         WHERE id = ?6 AND payment_status != 'success'",
        params![
            status.as_str(),
            confirm,
            gateway_payment_id,
            gateway_txn_id,
            format_timestamp(now),
            id
        ],
    )?;
    Ok(count > 0)
}

/// Stores the gateway transaction id. Never overwrites an existing one.
pub fn attach_transaction_id(
    conn: &Connection,
    id: &str,
    txn_id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET gateway_txn_id = ?1, updated_at = ?2
         WHERE id = ?3 AND gateway_txn_id IS NULL",
        params![txn_id, format_timestamp(now), id],
    )?;
    Ok(count > 0)
}

/// Moves a declined payment back to pending for another attempt.
pub fn reopen_failed_payment(
    conn: &Connection,
    id: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET payment_status = 'pending', updated_at = ?1
         WHERE id = ?2 AND payment_status = 'failed'",
        params![format_timestamp(now), id],
    )?;
    Ok(count > 0)
}

pub fn cancel_booking(
    conn: &Connection,
    id: &str,
    reason: &str,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let now = format_timestamp(now);
    let count = conn.execute(
        "UPDATE bookings SET
           booking_status = 'cancelled',
           cancelled_at = ?1,
           cancellation_reason = ?2,
           updated_at = ?1
         WHERE id = ?3 AND booking_status NOT IN ('cancelled', 'completed')",
        params![now, reason, id],
    )?;
    Ok(count > 0)
}

pub fn set_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: &DateTime<Utc>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET booking_status = ?1, updated_at = ?2
         WHERE id = ?3 AND booking_status NOT IN ('cancelled', 'completed')",
        params![status.as_str(), format_timestamp(now), id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let travel_date: String = row.get(5)?;
    let total_amount: String = row.get(6)?;
    let traveler_details: String = row.get(7)?;
    let booking_status: String = row.get(12)?;
    let payment_status: String = row.get(13)?;
    let cancelled_at: Option<String> = row.get(16)?;
    let created_at: String = row.get(19)?;
    let updated_at: String = row.get(20)?;

    let traveler_details: Vec<TravelerDetail> = serde_json::from_str(&traveler_details)
        .context("invalid traveler details column")?;

    Ok(Booking {
        id: row.get(0)?,
        booking_reference: row.get(1)?,
        owner_id: row.get(2)?,
        product_id: row.get(3)?,
        number_of_travelers: row.get(4)?,
        travel_date: parse_date(&travel_date)?,
        total_amount: parse_decimal(&total_amount)?,
        traveler_details,
        special_requests: row.get(8)?,
        email: row.get(9)?,
        phone: row.get(10)?,
        is_guest: row.get(11)?,
        booking_status: BookingStatus::parse(&booking_status)
            .with_context(|| format!("unknown booking status: {booking_status}"))?,
        payment_status: PaymentStatus::parse(&payment_status)
            .with_context(|| format!("unknown payment status: {payment_status}"))?,
        gateway_txn_id: row.get(14)?,
        gateway_payment_id: row.get(15)?,
        cancelled_at: cancelled_at.as_deref().map(parse_timestamp).transpose()?,
        cancellation_reason: row.get(17)?,
        cart_line_id: row.get(18)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

// ── Catalog ──

pub fn get_product(conn: &Connection, id: &str) -> anyhow::Result<Option<Product>> {
    let product = conn
        .query_row(
            "SELECT id, title, price, max_group_size, is_active, total_bookings
             FROM products WHERE id = ?1",
            params![id],
            |row| {
                let price: String = row.get(2)?;
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    price,
                    row.get::<_, u32>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()?;

    match product {
        Some((id, title, price, max_group_size, is_active, total_bookings)) => Ok(Some(Product {
            id,
            title,
            price: parse_decimal(&price)?,
            max_group_size,
            is_active,
            total_bookings,
        })),
        None => Ok(None),
    }
}

pub fn save_product(conn: &Connection, product: &Product) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO products (id, title, price, max_group_size, is_active, total_bookings)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           title = excluded.title,
           price = excluded.price,
           max_group_size = excluded.max_group_size,
           is_active = excluded.is_active",
        params![
            product.id,
            product.title,
            product.price.to_string(),
            product.max_group_size,
            product.is_active,
            product.total_bookings,
        ],
    )?;
    Ok(())
}

pub fn increment_product_bookings(conn: &Connection, product_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE products SET total_bookings = total_bookings + 1 WHERE id = ?1",
        params![product_id],
    )?;
    Ok(())
}

// ── Users ──

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, name, email, phone, role FROM users WHERE id = ?1",
            params![id],
            |row| {
                let role: String = row.get(4)?;
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    phone: row.get(3)?,
                    role: Role::parse(&role),
                })
            },
        )
        .optional()?;
    Ok(user)
}

pub fn save_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, phone, role)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           email = excluded.email,
           phone = excluded.phone,
           role = excluded.role",
        params![user.id, user.name, user.email, user.phone, user.role.as_str()],
    )?;
    Ok(())
}

// ── Carts ──

pub fn get_cart(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Cart>> {
    let row = conn
        .query_row(
            "SELECT user_id, items, version, updated_at FROM carts WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((user_id, items, version, updated_at)) => {
            let items: Vec<CartItem> =
                serde_json::from_str(&items).context("invalid cart items column")?;
            Ok(Some(Cart {
                user_id,
                items,
                version,
                updated_at: parse_timestamp(&updated_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Replaces the item list in one statement and bumps the version.
/// Returns the new version.
pub fn save_cart_items(
    conn: &Connection,
    user_id: &str,
    items: &[CartItem],
    now: &DateTime<Utc>,
) -> anyhow::Result<i64> {
    let items_json = serde_json::to_string(items)?;
    let version = conn.query_row(
        "INSERT INTO carts (user_id, items, version, updated_at) VALUES (?1, ?2, 1, ?3)
         ON CONFLICT(user_id) DO UPDATE SET
           items = excluded.items,
           version = carts.version + 1,
           updated_at = excluded.updated_at
         RETURNING version",
        params![user_id, items_json, format_timestamp(now)],
        |row| row.get(0),
    )?;
    Ok(version)
}
