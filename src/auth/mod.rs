pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts, http::StatusCode};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

use self::jwt::Claims;

/// The caller behind a verified bearer token. Every store operation is
/// scoped to `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}

fn rejected(message: &'static str) -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| rejected("missing bearer token"))?;

        match state.jwt.verify_token(bearer.token()) {
            Ok(claims) => Ok(claims.into()),
            Err(err) => {
                tracing::debug!(error = %err, "rejected bearer token");
                Err(rejected("invalid or expired token"))
            }
        }
    }
}
