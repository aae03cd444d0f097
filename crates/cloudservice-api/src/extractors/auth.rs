//! Bearer token extractor.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use cloudservice_core::error::AppError;
use cloudservice_service::context::RequestContext;

use crate::error::ApiError;
use crate::state::AppState;

/// Caller identity decoded from `Authorization: Bearer <jwt>`.
///
/// Any header or token problem rejects with 401. Role checks happen in
/// the handlers.
#[derive(Debug, Clone)]
pub struct AuthUser(pub RequestContext);

impl std::ops::Deref for AuthUser {
    type Target = RequestContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.jwt_decoder.decode_access_token(token)?;
        let context = RequestContext::new(claims.user_id(), claims.role, claims.username);
        Ok(Self(context))
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::authentication("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::authentication("Authorization header is not valid ASCII"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AppError::authentication("Expected a bearer token")),
    }
}
