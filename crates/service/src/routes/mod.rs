//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /                                - Service info and endpoint list
//! GET    /health                          - Liveness check
//! GET    /health/ready                    - Readiness check (database)
//!
//! # Auth
//! POST   /auth                            - Register a diner
//! PUT    /auth                            - Log in
//! DELETE /auth                            - Log out (bearer)
//! PUT    /auth/{id}                       - Update a user (self or admin)
//! GET    /user/me                         - The caller's user record
//!
//! # Orders
//! GET    /order/menu                      - Menu
//! PUT    /order/menu                      - Add a menu item (admin)
//! GET    /order?page=N                    - The caller's orders
//! POST   /order                           - Place an order
//!
//! # Franchises
//! GET    /franchise?page=&limit=&name=    - Franchise listing
//! POST   /franchise                       - Create a franchise (admin)
//! GET    /franchise/{id}                  - Franchises administered by user {id}
//! DELETE /franchise/{id}                  - Delete franchise {id} (admin)
//! POST   /franchise/{id}/store            - Create a store
//! DELETE /franchise/{id}/store/{storeId}  - Delete a store
//! ```

pub mod auth;
pub mod franchise;
pub mod order;
pub mod user;

use axum::{
    Json, Router,
    extract::{FromRequest, State},
    http::StatusCode,
    routing::get,
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::state::AppState;

/// JSON body extractor whose rejections use the service's error shape.
///
/// Malformed JSON, a wrong content type, or a field that fails validation
/// (such as a negative price) all become 400 `{"message": ...}`.
#[derive(Debug, Clone, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Body of a plain confirmation response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Create the full route tree.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(docs))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(auth::router())
        .merge(user::router())
        .merge(order::router())
        .merge(franchise::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.db().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// (method, path, requires auth, description)
const ENDPOINTS: &[(&str, &str, bool, &str)] = &[
    ("POST", "/auth", false, "Register a new diner"),
    ("PUT", "/auth", false, "Log in"),
    ("DELETE", "/auth", true, "Log out"),
    ("PUT", "/auth/{id}", true, "Update a user"),
    ("GET", "/user/me", true, "Get the authenticated user"),
    ("GET", "/order/menu", false, "Get the pizza menu"),
    ("PUT", "/order/menu", true, "Add a menu item"),
    ("GET", "/order", true, "Get the orders for the authenticated user"),
    ("POST", "/order", true, "Create an order for the authenticated user"),
    ("GET", "/franchise", false, "List franchises"),
    ("GET", "/franchise/{id}", true, "List the franchises of a user"),
    ("POST", "/franchise", true, "Create a franchise"),
    ("DELETE", "/franchise/{id}", true, "Delete a franchise"),
    ("POST", "/franchise/{id}/store", true, "Create a store"),
    ("DELETE", "/franchise/{id}/store/{storeId}", true, "Delete a store"),
];

/// Service info with the endpoint list.
async fn docs(State(state): State<AppState>) -> Json<Value> {
    let endpoints: Vec<Value> = ENDPOINTS
        .iter()
        .map(|(method, path, requires_auth, description)| {
            json!({
                "method": method,
                "path": path,
                "requiresAuth": requires_auth,
                "description": description,
            })
        })
        .collect();

    Json(json!({
        "message": "welcome to pizza service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints,
        "config": {
            "factory": state.config().factory.url.as_str(),
        },
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{body::Body, http::Request, routing::post};
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use tower::ServiceExt;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Greeting {
        name: String,
    }

    fn echo_router() -> Router {
        Router::new().route(
            "/",
            post(|JsonBody(greeting): JsonBody<Greeting>| async move {
                Json(json!({ "name": greeting.name }))
            }),
        )
    }

    async fn send(body: &'static str, content_type: &str) -> (StatusCode, Value) {
        let response = echo_router()
            .oneshot(
                Request::post("/")
                    .header("content-type", content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_json_body_accepts_valid_json() {
        let (status, body) = send(r#"{"name":"pepperoni"}"#, "application/json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "pepperoni");
    }

    #[tokio::test]
    async fn test_json_body_rejects_malformed_json() {
        let (status, body) = send("{\"name\":", "application/json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_json_body_rejects_missing_field() {
        let (status, body) = send("{}", "application/json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn test_json_body_rejects_wrong_content_type() {
        let (status, _) = send(r#"{"name":"pepperoni"}"#, "text/plain").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
