use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::services::cart::{self, AddToCartRequest, CartTotals, CartView, UpdateCartItemRequest};
use crate::state::AppState;

// GET /cart
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<CartView>, AppError> {
    let conn = state.db()?;
    Ok(Json(cart::get(&conn, &user.id)?))
}

// GET /cart/total
pub async fn get_total(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<CartTotals>, AppError> {
    let conn = state.db()?;
    Ok(Json(cart::totals(&conn, &user.id)?))
}

// POST /cart/items
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Json(body): Json<AddToCartRequest>,
) -> Result<Json<CartView>, AppError> {
    let conn = state.db()?;
    Ok(Json(cart::add_item(
        &conn,
        &user.id,
        body,
        Utc::now().date_naive(),
    )?))
}

// PUT /cart/items/:index
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(index): Path<usize>,
    Json(body): Json<UpdateCartItemRequest>,
) -> Result<Json<CartView>, AppError> {
    let conn = state.db()?;
    Ok(Json(cart::update_item(
        &conn,
        &user.id,
        index,
        body,
        Utc::now().date_naive(),
    )?))
}

// DELETE /cart/items/:index
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Path(index): Path<usize>,
) -> Result<Json<CartView>, AppError> {
    let conn = state.db()?;
    Ok(Json(cart::remove_item(&conn, &user.id, index)?))
}

// DELETE /cart
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<Value>, AppError> {
    let conn = state.db()?;
    cart::clear(&conn, &user.id)?;
    Ok(Json(json!({ "message": "Cart cleared successfully" })))
}
