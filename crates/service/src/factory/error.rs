//! Fulfillment error types.

use thiserror::Error;

/// Errors that can occur when submitting an order to the factory.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The request never completed (connect failure, timeout, ...).
    #[error("factory request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The factory answered with a non-success status.
    #[error("factory rejected order with status {status}")]
    Rejected {
        status: u16,
        /// Where the factory wants the failure reported, if it said.
        report_url: Option<String>,
    },

    /// The factory answered 2xx but the body was not a usable ticket.
    #[error("invalid factory response: {message}")]
    InvalidResponse {
        message: String,
        report_url: Option<String>,
    },

    /// The request body could not be built.
    #[error("failed to encode factory request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The signing key was rejected by HMAC.
    #[error("invalid signing key")]
    SigningKey,
}

impl FactoryError {
    /// The factory's diagnostic reference for this failure, if it gave one.
    #[must_use]
    pub fn report_url(&self) -> Option<&str> {
        match self {
            Self::Rejected { report_url, .. } | Self::InvalidResponse { report_url, .. } => {
                report_url.as_deref()
            }
            Self::Request(_) | Self::Encode(_) | Self::SigningKey => None,
        }
    }
}
