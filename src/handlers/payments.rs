use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequest, Request, State};
use axum::http::header;
use axum::response::Redirect;
use axum::{Form, Json};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::auth::MaybeUser;
use crate::errors::AppError;
use crate::models::{GatewayCallback, PaymentInitiation, PaymentOutcome};
use crate::services::emi::{self, EmiQuote};
use crate::services::payments;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub booking_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EmiRequest {
    pub amount: Decimal,
}

/// Gateway callback body. The hosted page posts a form; server-to-server
/// notifications may arrive as JSON.
pub struct CallbackPayload(pub GatewayCallback);

#[async_trait]
impl<S> FromRequest<S> for CallbackPayload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        let callback = if is_json {
            Json::<GatewayCallback>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?
                .0
        } else {
            Form::<GatewayCallback>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?
                .0
        };
        Ok(CallbackPayload(callback))
    }
}

// POST /payments/initiate
pub async fn initiate(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Json(body): Json<InitiateRequest>,
) -> Result<Json<PaymentInitiation>, AppError> {
    let caller = user.as_ref().map(|u| u.id.as_str());
    Ok(Json(payments::initiate(&state, &body.booking_id, caller)?))
}

// POST /payments/verify
pub async fn verify(
    State(state): State<Arc<AppState>>,
    CallbackPayload(callback): CallbackPayload,
) -> Result<Redirect, AppError> {
    let outcome = payments::verify(&state, callback).await?;
    let page = if outcome.success { "success" } else { "failure" };
    Ok(Redirect::to(&format!(
        "{}/payment/{page}?bookings={}",
        state.config.frontend_url.trim_end_matches('/'),
        outcome.booking_id
    )))
}

// POST /payments/webhook
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    CallbackPayload(callback): CallbackPayload,
) -> Result<Json<PaymentOutcome>, AppError> {
    Ok(Json(payments::verify(&state, callback).await?))
}

// POST /payments/emi-options
pub async fn emi_options(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmiRequest>,
) -> Result<Json<EmiQuote>, AppError> {
    Ok(Json(emi::quote(body.amount, &state.config.emi_providers)?))
}
