//! User route handlers.

use axum::{Json, Router, routing::get};

use crate::middleware::RequireAuth;
use crate::models::User;
use crate::state::AppState;

/// Build the user router.
pub fn router() -> Router<AppState> {
    Router::new().route("/user/me", get(me))
}

/// The authenticated caller's user record.
pub async fn me(RequireAuth(identity): RequireAuth) -> Json<User> {
    Json(identity.into_user())
}
