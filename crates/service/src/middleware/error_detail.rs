//! Error detail middleware.
//!
//! When `PIZZA_EXPOSE_ERROR_DETAIL` is on, 500 responses produced from an
//! [`AppError`](crate::error::AppError) gain a `stack` field carrying the
//! error chain. Off by default; meant for non-production deployments.

use axum::{
    Json,
    body::to_bytes,
    extract::{Request, State},
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::error::ErrorDetail;
use crate::state::AppState;

/// Error bodies are small JSON objects; anything larger is left alone.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Middleware that adds `stack` to server error bodies when enabled.
pub async fn error_detail_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    if !state.config().expose_error_detail || !response.status().is_server_error() {
        return response;
    }
    let Some(ErrorDetail(stack)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (parts, body) = response.into_parts();
    let Ok(bytes) = to_bytes(body, MAX_ERROR_BODY).await else {
        return parts.status.into_response();
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut body)) => {
            body.insert("stack".to_string(), Value::String(stack));
            let mut response = (parts.status, Json(Value::Object(body))).into_response();
            for (name, value) in &parts.headers {
                if name != CONTENT_LENGTH && name != CONTENT_TYPE {
                    response.headers_mut().append(name.clone(), value.clone());
                }
            }
            response
        }
        _ => Response::from_parts(parts, bytes.into()),
    }
}
