//! HR operator accounts and bearer-token authentication.

pub mod handlers;
pub mod password;
pub mod repo;
pub mod tokens;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// The authenticated caller, extracted from the `Authorization: Bearer`
/// header. Rejects with 401 when the header is missing or the token is
/// invalid or expired.
pub struct AuthUser {
    pub user_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;
        let user_id =
            tokens::verify_token(&state.config.jwt_secret, token).ok_or(AppError::Unauthorized)?;

        Ok(AuthUser { user_id })
    }
}
