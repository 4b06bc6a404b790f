//! HTTP client for the factory API.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{debug, instrument, warn};

use super::types::{FactoryOrderRequest, FactoryResponse};
use super::{FactoryError, Fulfillment, FulfillmentTicket, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::config::FactoryConfig;
use crate::models::{Order, User};

/// Factory API client.
#[derive(Clone)]
pub struct FactoryClient {
    client: Client,
    /// Full URL of the order endpoint.
    endpoint: String,
    api_key: SecretString,
    signing_secret: SecretString,
}

impl std::fmt::Debug for FactoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .field("signing_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl FactoryClient {
    /// Create a client for the configured factory.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::Request` if the HTTP client cannot be built.
    pub fn new(config: &FactoryConfig) -> Result<Self, FactoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/order", config.url.as_str().trim_end_matches('/')),
            api_key: config.api_key.clone(),
            signing_secret: config.signing_secret.clone(),
        })
    }

    /// The order endpoint this client posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Fulfillment for FactoryClient {
    #[instrument(skip(self, diner, order), fields(order_id = %order.id, diner_id = %diner.id))]
    async fn fulfill(&self, diner: &User, order: &Order) -> Result<FulfillmentTicket, FactoryError> {
        let body = serde_json::to_vec(&FactoryOrderRequest {
            diner: diner.into(),
            order,
        })?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_payload(
            self.signing_secret.expose_secret().as_bytes(),
            &timestamp,
            &body,
        )?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, &timestamp)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let parsed: Option<FactoryResponse> = serde_json::from_slice(&bytes).ok();

        if !status.is_success() {
            let report_url = parsed.and_then(|r| r.report_url);
            warn!(status = status.as_u16(), report_url = ?report_url, "Factory rejected order");
            return Err(FactoryError::Rejected {
                status: status.as_u16(),
                report_url,
            });
        }

        match parsed {
            Some(FactoryResponse {
                jwt: Some(jwt),
                report_url,
            }) => {
                debug!("Factory accepted order");
                Ok(FulfillmentTicket { jwt, report_url })
            }
            other => Err(FactoryError::InvalidResponse {
                message: "missing fulfillment ticket".to_string(),
                report_url: other.and_then(|r| r.report_url),
            }),
        }
    }
}

/// Compute the `X-Pizza-Signature` value for a request body.
///
/// The MAC covers `v1:{timestamp}:{body}`.
///
/// # Errors
///
/// Returns `FactoryError::SigningKey` if HMAC rejects the key.
pub fn sign_payload(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<String, FactoryError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| FactoryError::SigningKey)?;
    mac.update(b"v1:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);

    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"factory-signing-secret-for-tests-0123456789";

    #[test]
    fn test_signature_format() {
        let sig = sign_payload(SECRET, "1700000000", br#"{"order":{}}"#).unwrap();
        assert!(sig.starts_with("sha256="));
        assert_eq!(sig.len(), "sha256=".len() + 64);
    }

    #[test]
    fn test_signature_covers_timestamp_and_body() {
        let base = sign_payload(SECRET, "1700000000", b"body").unwrap();
        assert_eq!(base, sign_payload(SECRET, "1700000000", b"body").unwrap());
        assert_ne!(base, sign_payload(SECRET, "1700000001", b"body").unwrap());
        assert_ne!(base, sign_payload(SECRET, "1700000000", b"bodY").unwrap());
        assert_ne!(
            base,
            sign_payload(b"another-secret", "1700000000", b"body").unwrap()
        );
    }

    #[test]
    fn test_endpoint_joins_path() {
        let config = FactoryConfig {
            url: url::Url::parse("https://factory.example.com/").unwrap(),
            api_key: SecretString::from("k"),
            signing_secret: SecretString::from("s"),
            timeout_secs: 1,
        };
        let client = FactoryClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "https://factory.example.com/api/order");
    }

    #[test]
    fn test_report_url_only_from_factory_answers() {
        let err = FactoryError::Rejected {
            status: 500,
            report_url: Some("http://x".to_string()),
        };
        assert_eq!(err.report_url(), Some("http://x"));
        assert_eq!(FactoryError::SigningKey.report_url(), None);
    }
}
