//! Authentication extractors.
//!
//! Handlers that need a caller take [`RequireAuth`]; handlers where a caller
//! only widens what is returned take [`OptionalAuth`]. Both resolve the
//! `Authorization: Bearer <token>` header through the token store and hand
//! the handler an [`Identity`] to pass into services.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::Span;

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, AuthService};
use crate::services::authz::Identity;
use crate::state::AppState;

/// Extract the raw token from an `Authorization: Bearer` header.
///
/// The scheme is matched case-insensitively; anything else yields `None`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<Identity>, AppError> {
    let Some(token) = bearer_token(&parts.headers) else {
        return Ok(None);
    };

    let auth = AuthService::new(state.db(), state.telemetry().metrics());
    match auth.authenticate(token).await {
        Ok(identity) => {
            Span::current().record("user_id", identity.id().to_string());
            set_sentry_user(&identity.id(), Some(identity.user().email.as_str()));
            Ok(Some(identity))
        }
        Err(AuthError::InvalidToken) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Extractor that requires an authenticated caller.
///
/// Rejects with 401 `{"message":"unauthorized"}` if the header is missing
/// or the token is unknown or revoked.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireAuth(identity): RequireAuth) -> Json<User> {
///     Json(identity.into_user())
/// }
/// ```
pub struct RequireAuth(pub Identity);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("unauthorized".to_string()))
    }
}

/// Extractor that resolves the caller if a valid token is presented.
///
/// A missing or invalid token yields `None` rather than a rejection.
pub struct OptionalAuth(pub Option<Identity>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve(parts, state).await?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("abc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
