//! [Alby](https://getalby.com) wallet API backend.

use async_trait::async_trait;
use bon::Builder;
use l402_core::payment::{BoxError, PayInvoice};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{BackendError, default_http_client, non_empty, rejection};

pub const ALBY_API_URL: &str = "https://api.getalby.com/";

fn default_base_url() -> Url {
    Url::parse(ALBY_API_URL).expect("valid Alby API URL")
}

/// Pays invoices through the Alby wallet API with an OAuth access token.
#[derive(Builder, Debug, Clone)]
pub struct AlbyBackend {
    #[builder(into)]
    pub access_token: String,
    #[builder(default = default_base_url())]
    pub base_url: Url,
    #[builder(default = default_http_client())]
    pub client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PayBolt11<'a> {
    invoice: &'a str,
}

#[derive(Debug, Deserialize)]
struct PaymentResult {
    #[serde(default)]
    payment_preimage: Option<String>,
}

impl AlbyBackend {
    async fn pay(&self, invoice: &str) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.base_url.join("payments/bolt11")?)
            .bearer_auth(&self.access_token)
            .json(&PayBolt11 { invoice })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let result: PaymentResult = response.json().await?;
        non_empty(result.payment_preimage).ok_or(BackendError::MissingPreimage)
    }
}

#[async_trait]
impl PayInvoice for AlbyBackend {
    async fn pay_invoice(&self, invoice: &str) -> Result<String, BoxError> {
        self.pay(invoice)
            .await
            .map_err(|err| err.into_payment_error(invoice))
    }
}
