//! Bearer tokens issued by the account service.
//!
//! Format: `b64url(claims json).b64url(hmac-sha256(claims part))`, keyed
//! with `AUTH_TOKEN_SECRET`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::Role;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    /// Expiry, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub role: Role,
}

/// Caller identity on public routes; `None` for anonymous callers.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

fn sign(secret: &str, payload: &str) -> anyhow::Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid token secret: {e}"))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn issue_token(secret: &str, user_id: &str, role: Role, ttl_secs: i64) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: Utc::now().timestamp() + ttl_secs,
    };
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
    let signature = URL_SAFE_NO_PAD.encode(sign(secret, &payload)?);
    Ok(format!("{payload}.{signature}"))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    let (payload, signature) = token.split_once('.').ok_or(AppError::Unauthorized)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AppError::Unauthorized)?;
    let expected = sign(secret, payload)?;

    if !bool::from(expected.ct_eq(&signature)) {
        return Err(AppError::Unauthorized);
    }

    let claims: Claims = URL_SAFE_NO_PAD
        .decode(payload)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(AppError::Unauthorized)?;

    if claims.exp <= Utc::now().timestamp() {
        return Err(AppError::Unauthorized);
    }
    Ok(claims)
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(parts: &Parts, state: &AppState) -> Result<CurrentUser, AppError> {
    let token = bearer(parts).ok_or(AppError::Unauthorized)?;
    let claims = verify_token(state.config.auth_token_secret.expose_secret(), token)?;
    Ok(CurrentUser {
        id: claims.sub,
        role: claims.role,
    })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state) {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

pub fn require_role(user: &CurrentUser, role: Role) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden(format!(
            "{} role required",
            role.as_str()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let token = issue_token("s3cret", "user-1", Role::Admin, 60).unwrap();
        let claims = verify_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token("s3cret", "user-1", Role::User, 60).unwrap();
        assert!(matches!(
            verify_token("other", &token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token("s3cret", "user-1", Role::User, -1).unwrap();
        assert!(verify_token("s3cret", &token).is_err());
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let token = issue_token("s3cret", "user-1", Role::User, 60).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged_claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                sub: "user-1".to_string(),
                role: Role::Admin,
                exp: Utc::now().timestamp() + 60,
            })
            .unwrap(),
        );
        let forged = format!("{forged_claims}.{signature}");
        assert!(verify_token("s3cret", &forged).is_err());
    }

    #[test]
    fn test_require_role() {
        let user = CurrentUser {
            id: "u".to_string(),
            role: Role::User,
        };
        assert!(matches!(
            require_role(&user, Role::Admin),
            Err(AppError::Forbidden(_))
        ));
        assert!(require_role(&user, Role::User).is_ok());
    }
}
