pub mod bookings;
pub mod cart;
pub mod health;
pub mod payments;

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(bookings::create).get(bookings::list_mine))
        .route("/bookings/checkout", post(bookings::checkout))
        .route("/bookings/guest-checkout", post(bookings::guest_checkout))
        .route("/bookings/admin/all", get(bookings::admin_list))
        .route("/bookings/admin/:id/status", put(bookings::admin_set_status))
        .route("/bookings/:id", get(bookings::get_one))
        .route("/bookings/:id/cancel", put(bookings::cancel))
        .route("/payments/initiate", post(payments::initiate))
        .route("/payments/verify", post(payments::verify))
        .route("/payments/webhook", post(payments::webhook))
        .route("/payments/emi-options", post(payments::emi_options))
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/total", get(cart::get_total))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/:index",
            put(cart::update_item).delete(cart::remove_item),
        )
}

fn cors(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);
    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(frontend_url, "FRONTEND_URL is not a valid origin, CORS disabled");
            layer
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let prefix = state.config.api_prefix.clone();
    let cors = cors(&state.config.frontend_url);

    let app = Router::new().route("/health", get(health::health));
    let app = if prefix.trim_matches('/').is_empty() {
        app.merge(api_routes())
    } else {
        app.nest(&prefix, api_routes())
    };

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
