//! [LNbits](https://lnbits.com) wallet backend.

use async_trait::async_trait;
use bon::Builder;
use l402_core::payment::{BoxError, PayInvoice};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{BackendError, default_http_client, non_empty, rejection};

const API_KEY_HEADER: &str = "X-Api-Key";

/// Pays invoices from an LNbits wallet using its admin key.
///
/// `base_url` should end with a slash when LNbits is served under a path prefix.
#[derive(Builder, Debug, Clone)]
pub struct LnbitsBackend {
    pub base_url: Url,
    #[builder(into)]
    pub admin_key: String,
    #[builder(default = default_http_client())]
    pub client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CreatePayment<'a> {
    out: bool,
    bolt11: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedPayment {
    payment_hash: String,
    #[serde(default)]
    preimage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentStatus {
    paid: bool,
    #[serde(default)]
    preimage: Option<String>,
}

impl LnbitsBackend {
    async fn pay(&self, invoice: &str) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.base_url.join("api/v1/payments")?)
            .header(API_KEY_HEADER, &self.admin_key)
            .json(&CreatePayment {
                out: true,
                bolt11: invoice,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let created: CreatedPayment = response.json().await?;
        if let Some(preimage) = non_empty(created.preimage) {
            return Ok(preimage);
        }

        let response = self
            .client
            .get(
                self.base_url
                    .join(&format!("api/v1/payments/{}", created.payment_hash))?,
            )
            .header(API_KEY_HEADER, &self.admin_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let status: PaymentStatus = response.json().await?;
        if !status.paid {
            return Err(BackendError::NotSettled {
                payment_hash: created.payment_hash,
            });
        }
        non_empty(status.preimage).ok_or(BackendError::MissingPreimage)
    }
}

#[async_trait]
impl PayInvoice for LnbitsBackend {
    async fn pay_invoice(&self, invoice: &str) -> Result<String, BoxError> {
        self.pay(invoice)
            .await
            .map_err(|err| err.into_payment_error(invoice))
    }
}
