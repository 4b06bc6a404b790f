//! Factory wire types.

use serde::{Deserialize, Serialize};

use pizza_core::{Email, UserId};

use crate::models::{Order, User};

/// The diner section of a factory request.
#[derive(Debug, Clone, Serialize)]
pub struct Diner {
    pub id: UserId,
    pub name: String,
    pub email: Email,
}

impl From<&User> for Diner {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Body of `POST /api/order`.
#[derive(Debug, Serialize)]
pub struct FactoryOrderRequest<'a> {
    pub diner: Diner,
    pub order: &'a Order,
}

/// Raw factory response body. Both fields are optional on the wire so that
/// error bodies can be read with the same type.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FactoryResponse {
    pub jwt: Option<String>,
    pub report_url: Option<String>,
}

/// Proof that the factory accepted an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentTicket {
    /// Signed fulfillment ticket issued by the factory.
    pub jwt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
}
