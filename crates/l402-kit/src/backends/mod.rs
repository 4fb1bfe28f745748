//! REST payment backends.
//!
//! Each backend is a self-contained [`PayInvoice`](l402_core::payment::PayInvoice)
//! implementation with no state beyond its credentials and HTTP client.

use std::time::Duration;

use http::StatusCode;
use l402_core::{errors::Error, payment::BoxError};

pub mod alby;
pub mod lnbits;

/// Timeout applied to backend HTTP calls by [`default_http_client`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("HTTP request error: {0}")]
    HttpRequestError(#[from] reqwest::Error),
    #[error("Payment rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },
    #[error("Payment {payment_hash} is not settled")]
    NotSettled { payment_hash: String },
    #[error("Payment succeeded without a preimage")]
    MissingPreimage,
}

impl BackendError {
    /// Convert into the error returned from `pay_invoice`.
    ///
    /// Rejections mentioning an expired invoice become [`Error::InvoiceExpired`].
    pub fn into_payment_error(self, invoice: &str) -> BoxError {
        match self {
            BackendError::Rejected { message, .. } if message.to_lowercase().contains("expired") => {
                Box::new(Error::InvoiceExpired {
                    invoice: invoice.to_string(),
                })
            }
            other => Box::new(other),
        }
    }
}

/// A `reqwest` client with [`DEFAULT_TIMEOUT`].
pub fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Turn a non-success response into [`BackendError::Rejected`].
async fn rejection(response: reqwest::Response) -> BackendError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    BackendError::Rejected { status, message }
}

/// Treat empty preimages as missing.
fn non_empty(preimage: Option<String>) -> Option<String> {
    preimage.filter(|p| !p.trim().is_empty())
}
