//! Authentication route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::put,
};
use serde::Deserialize;

use pizza_core::UserId;

use crate::error::{Result, clear_sentry_user};
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::routes::{JsonBody, MessageResponse};
use crate::services::auth::{AuthService, ProfileUpdate, Session};
use crate::services::authz::Capability;
use crate::state::AppState;

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth", put(login).post(register).delete(logout))
        .route("/auth/{id}", put(update_user))
}

// =============================================================================
// Request Types
// =============================================================================

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// User update request. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new diner and log them in.
///
/// # Errors
///
/// 400 for missing fields or an invalid email, 409 for a taken email.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<Json<Session>> {
    let auth = AuthService::new(state.db(), state.telemetry().metrics());
    let session = auth.register(&body.name, &body.email, &body.password).await?;
    Ok(Json(session))
}

/// Log in with email and password.
///
/// # Errors
///
/// 404 `"unknown user"` for a wrong email or password.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<Session>> {
    let auth = AuthService::new(state.db(), state.telemetry().metrics());
    let session = auth.login(&body.email, &body.password).await?;
    Ok(Json(session))
}

/// Revoke the presented token.
///
/// # Errors
///
/// 401 without a valid token.
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
) -> Result<Json<MessageResponse>> {
    let auth = AuthService::new(state.db(), state.telemetry().metrics());
    auth.logout(&identity).await?;
    clear_sentry_user();

    Ok(Json(MessageResponse {
        message: "logout successful",
    }))
}

/// Update a user's name, email, or password.
///
/// # Errors
///
/// 403 `"unauthorized"` unless the caller is that user or an admin.
pub async fn update_user(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Path(user_id): Path<UserId>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> Result<Json<User>> {
    identity.require(Capability::ActAsUser(user_id), "unauthorized")?;

    let auth = AuthService::new(state.db(), state.telemetry().metrics());
    let user = auth
        .update_user(
            user_id,
            ProfileUpdate {
                name: body.name.as_deref(),
                email: body.email.as_deref(),
                password: body.password.as_deref(),
            },
        )
        .await?;
    Ok(Json(user))
}
