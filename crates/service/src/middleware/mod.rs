//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 3. Request ID (propagate or generate `x-request-id`)
//! 4. CORS
//! 5. Request telemetry (method counters, latency, request log events)
//! 6. Error detail (optional `stack` on 500 bodies)
//!
//! Authentication is not a layer: handlers opt in with the [`RequireAuth`]
//! or [`OptionalAuth`] extractors.

pub mod auth;
pub mod error_detail;
pub mod request_id;
pub mod telemetry;

pub use auth::{OptionalAuth, RequireAuth, bearer_token};
pub use error_detail::error_detail_middleware;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use telemetry::telemetry_middleware;
