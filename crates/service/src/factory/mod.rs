//! Fulfillment client for the external pizza factory.
//!
//! Each placed order is sent to the factory exactly once. The request is
//! signed with HMAC-SHA256 so the factory can authenticate its origin, and
//! carries the pre-shared API key as a bearer credential.
//!
//! Any transport failure, non-2xx status, or unreadable body is a
//! [`FactoryError`]. There is no retry.

mod client;
mod error;
mod types;

pub use client::{FactoryClient, sign_payload};
pub use error::FactoryError;
pub use types::{Diner, FactoryOrderRequest, FulfillmentTicket};

use async_trait::async_trait;

use crate::models::{Order, User};

/// Header carrying the request signature (`sha256=<hex>`).
pub const SIGNATURE_HEADER: &str = "x-pizza-signature";

/// Header carrying the Unix timestamp the signature covers.
pub const TIMESTAMP_HEADER: &str = "x-pizza-timestamp";

/// Anything that can fulfill a persisted order.
#[async_trait]
pub trait Fulfillment: Send + Sync {
    /// Submit `order`, placed by `diner`, for fulfillment.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError` if the factory did not accept the order.
    async fn fulfill(&self, diner: &User, order: &Order) -> Result<FulfillmentTicket, FactoryError>;
}
