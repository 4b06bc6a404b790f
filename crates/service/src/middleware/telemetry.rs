//! Request telemetry middleware.
//!
//! Counts every request by method, records service latency, and ships one
//! `http` log event per request. Request and response bodies are never
//! shipped.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::state::AppState;
use crate::telemetry::{LogEvent, LogLevel};

/// Middleware that feeds request metrics and request log events.
pub async fn telemetry_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let authorized = request.headers().contains_key(AUTHORIZATION);

    let telemetry = state.telemetry();
    telemetry.metrics().record_request(&method);

    let response = next.run(request).await;

    let elapsed = started.elapsed();
    telemetry.metrics().observe_service_latency(elapsed);

    let status = response.status().as_u16();
    telemetry.log(LogEvent::new(
        "http",
        LogLevel::for_status(status),
        json!({
            "method": method.as_str(),
            "path": path,
            "status": status,
            "authorized": authorized,
            "latencyMs": u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }),
    ));

    response
}
