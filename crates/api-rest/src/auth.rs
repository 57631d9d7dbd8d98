//! Bearer-token authentication as an axum extractor.

use crate::blocking::run_blocking;
use crate::error::{ApiError, AUTH_REQUIRED, INVALID_TOKEN};
use crate::AppState;
use api_shared::{bearer_token, AuthError};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use imgvault_core::UserId;

/// The authenticated caller. Rejects with `401` when the header is missing or the token is
/// invalid or expired.
#[derive(Clone, Debug)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(AUTHORIZATION) {
            Some(value) => Some(value.to_str().map_err(|_| INVALID_TOKEN)?),
            None => None,
        };

        let token = match bearer_token(header) {
            Ok(token) => token.to_string(),
            Err(AuthError::Missing) => {
                tracing::debug!("request without authorization header");
                return Err(AUTH_REQUIRED);
            }
            Err(AuthError::Malformed) => {
                tracing::warn!("malformed authorization header");
                return Err(INVALID_TOKEN);
            }
        };

        let identity = state.identity.clone();
        let user_id = run_blocking(
            state.operation_timeout,
            "validate token",
            "Invalid token",
            move || identity.validate_token(&token),
        )
        .await?;

        Ok(AuthUser(user_id))
    }
}
