//! The L402 client and its payment flow.
//!
//! For details, see the [`L402Client`] struct documentation.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode, header::AUTHORIZATION};
use l402_core::{
    amount::extract_amount,
    budget::{BudgetController, BudgetPolicy},
    cache::CredentialCache,
    challenge::{Challenge, authorization_value, find_challenge},
    errors::Error,
    ledger::SpendingLedger,
    payment::{BoxError, PayInvoice},
};
use url::Url;

use crate::{
    body::RequestBody,
    config::{ClientConfig, RequestOptions, UnknownAmountPolicy, merge_headers},
    discovery::discover_payment,
    errors::{ClientError, Result},
    transport::{HttpRequest, HttpTransport, ReqwestTransport},
};

/// An HTTP client that pays L402 challenges.
///
/// Every request goes through [`fetch`](L402Client::fetch):
///
/// 1. **Prepare**: merge default headers, read streaming bodies into memory, and attach a
///    cached credential for the resource group if one is still valid.
/// 2. **Send**: anything other than `402 Payment Required` is returned as is.
/// 3. **Challenge**: a 402 without an L402 `WWW-Authenticate` challenge is returned as is.
///    A cached credential that was answered with a challenge is dropped.
/// 4. **Check**: the invoice amount is reserved against the budget. Rejections are returned
///    before any payment is attempted; a failed payment releases the reservation.
/// 5. **Pay**: the invoice is paid through the [`PayInvoice`] backend; the attempt is
///    recorded in the [`SpendingLedger`].
/// 6. **Retry**: the credential is cached and the request is sent once more with
///    `Authorization: L402 <macaroon>:<preimage>`. That response is returned as is, even if
///    it is another 402.
///
/// Budget, cache and ledger belong to this client alone and may be shared by concurrent
/// requests through an `Arc<L402Client>`. The budget is reserved while a payment is in
/// flight, so concurrent requests cannot together exceed a limit.
pub struct L402Client {
    transport: Arc<dyn HttpTransport>,
    payment: Option<Arc<dyn PayInvoice>>,
    budget: Option<BudgetController>,
    cache: CredentialCache,
    ledger: SpendingLedger,
    request_defaults: HeaderMap,
    unknown_amount: UnknownAmountPolicy,
}

impl std::fmt::Debug for L402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L402Client")
            .field("has_payment", &self.payment.is_some())
            .field("budget", &self.budget)
            .field("cache", &self.cache)
            .field("ledger", &self.ledger)
            .field("unknown_amount", &self.unknown_amount)
            .finish()
    }
}

impl Default for L402Client {
    fn default() -> Self {
        L402Client::new(ClientConfig::default())
    }
}

/// A request ready to be sent, possibly twice.
struct PreparedRequest {
    method: Method,
    url: Url,
    origin: String,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    // Sent with a cached credential.
    cached: bool,
}

impl PreparedRequest {
    fn to_http(&self) -> HttpRequest {
        HttpRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}

impl L402Client {
    pub fn new(config: ClientConfig) -> Self {
        let payment = match config.payment {
            Some(payment) => Some(payment),
            None if config.discover_payment => discover_payment(),
            None => None,
        };
        let transport = config
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));

        let budget = match config.budget {
            BudgetPolicy::Limits(limits) => {
                Some(BudgetController::with_clock(limits, config.clock.clone()))
            }
            BudgetPolicy::Disabled => None,
        };

        L402Client {
            transport,
            payment,
            budget,
            cache: CredentialCache::with_clock(config.credential_cache, config.clock.clone()),
            ledger: SpendingLedger::with_clock(config.clock),
            request_defaults: config.request_defaults,
            unknown_amount: config.unknown_amount,
        }
    }

    /// Spending history of this client.
    pub fn ledger(&self) -> &SpendingLedger {
        &self.ledger
    }

    /// Budget enforcement, unless disabled.
    pub fn budget(&self) -> Option<&BudgetController> {
        self.budget.as_ref()
    }

    /// Credentials bought so far.
    pub fn credentials(&self) -> &CredentialCache {
        &self.cache
    }

    /// Whether a payment backend is available.
    pub fn can_pay(&self) -> bool {
        self.payment.is_some()
    }

    pub async fn get(&self, url: &str) -> Result<Response<Bytes>> {
        self.fetch(url, RequestOptions::new(Method::GET)).await
    }

    pub async fn head(&self, url: &str) -> Result<Response<Bytes>> {
        self.fetch(url, RequestOptions::new(Method::HEAD)).await
    }

    pub async fn delete(&self, url: &str) -> Result<Response<Bytes>> {
        self.fetch(url, RequestOptions::new(Method::DELETE)).await
    }

    pub async fn post(&self, url: &str, body: impl Into<RequestBody>) -> Result<Response<Bytes>> {
        self.fetch(url, RequestOptions::new(Method::POST).with_body(body))
            .await
    }

    pub async fn put(&self, url: &str, body: impl Into<RequestBody>) -> Result<Response<Bytes>> {
        self.fetch(url, RequestOptions::new(Method::PUT).with_body(body))
            .await
    }

    pub async fn patch(&self, url: &str, body: impl Into<RequestBody>) -> Result<Response<Bytes>> {
        self.fetch(url, RequestOptions::new(Method::PATCH).with_body(body))
            .await
    }

    /// Perform a request, paying an L402 challenge if the server asks for one.
    pub async fn fetch(&self, url: &str, options: RequestOptions) -> Result<Response<Bytes>> {
        let mut request = self.prepare(url, options).await?;

        let response = self.send(&request).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(response);
        }

        let Some(challenge) = find_challenge(response.headers()) else {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "402 from {}{} without an L402 challenge; returning it unchanged",
                request.origin,
                request.path
            );
            return Ok(response);
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "L402 challenge from {}{}: credential='{}'",
            request.origin,
            request.path,
            challenge.credential_id
        );

        if request.cached {
            self.cache.remove(&request.origin, &request.path);
        }

        let proof = self.pay(&request, &challenge).await?;

        // Paid already; a proof that cannot be sent is never cached.
        let authorization =
            HeaderValue::from_str(&authorization_value(&challenge.credential_id, &proof))
                .map_err(|_| Error::PaymentFailed {
                    reason: "proof of payment is not a valid header value".to_string(),
                    invoice: challenge.invoice.clone(),
                })?;

        self.cache.put(
            &request.origin,
            &request.path,
            challenge.credential_id,
            proof,
            None,
        );
        request.headers.insert(AUTHORIZATION, authorization);

        self.send(&request).await
    }

    /// Resolve the target, merge headers, buffer the body and attach a cached credential.
    async fn prepare(&self, url: &str, options: RequestOptions) -> Result<PreparedRequest> {
        let url = Url::parse(url)?;
        let origin = url.origin().ascii_serialization();
        let path = url.path().to_string();

        let mut headers = merge_headers(&self.request_defaults, &options.headers);
        let body = options
            .body
            .into_replayable()
            .await
            .map_err(ClientError::BodyError)?;

        let cached = self.cache.get(&origin, &path);
        if let Some(credential) = &cached {
            #[cfg(feature = "tracing")]
            tracing::debug!("Using cached L402 credential for {origin}{path}");

            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&credential.authorization_value())?,
            );
        }

        Ok(PreparedRequest {
            method: options.method,
            url,
            origin,
            path,
            headers,
            body,
            cached: cached.is_some(),
        })
    }

    async fn send(&self, request: &PreparedRequest) -> Result<Response<Bytes>> {
        self.transport
            .send(request.to_http())
            .await
            .map_err(ClientError::HttpRequestError)
    }

    /// Check the invoice against the budget, pay it and account for the attempt.
    ///
    /// Returns the proof of payment.
    async fn pay(&self, request: &PreparedRequest, challenge: &Challenge) -> Result<String> {
        let amount = extract_amount(&challenge.invoice);

        let reservation = match amount {
            Some(amount) => self
                .budget
                .as_ref()
                .map(|budget| budget.reserve(amount, request.url.host_str()))
                .transpose()?,
            None => match self.unknown_amount {
                UnknownAmountPolicy::Reject => {
                    return Err(Error::UnknownAmount {
                        invoice: challenge.invoice.clone(),
                    }
                    .into());
                }
                UnknownAmountPolicy::Allow => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        "Paying invoice without an amount for {}{}; budget is not enforced",
                        request.origin,
                        request.path
                    );
                    None
                }
            },
        };

        let payment = self.payment.as_ref().ok_or(Error::NoPaymentCapability)?;

        let proof = match payment.pay_invoice(&challenge.invoice).await {
            Ok(proof) => proof,
            Err(err) => {
                if let Some(amount) = amount {
                    self.ledger
                        .record(&request.origin, &request.path, amount, "", false);
                }

                let err = into_payment_error(err, &challenge.invoice);

                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "L402 payment for {}{} failed: {err}",
                    request.origin,
                    request.path
                );

                return Err(err.into());
            }
        };

        if let Some(reservation) = reservation {
            reservation.commit();
        }
        if let Some(amount) = amount {
            self.ledger
                .record(&request.origin, &request.path, amount, proof.as_str(), true);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "L402 invoice paid for {}{}: amount={:?} sats",
            request.origin,
            request.path,
            amount
        );

        Ok(proof)
    }
}

/// Keep errors the backend already expressed as L402 errors, wrap everything else.
fn into_payment_error(err: BoxError, invoice: &str) -> Error {
    match err.downcast::<Error>() {
        Ok(err) => *err,
        Err(other) => Error::PaymentFailed {
            reason: other.to_string(),
            invoice: invoice.to_string(),
        },
    }
}
