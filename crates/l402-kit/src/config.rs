//! Client and per-request configuration.

use std::sync::Arc;

use bon::Builder;
use http::{HeaderMap, Method};
use l402_core::{
    budget::BudgetPolicy,
    cache::CacheConfig,
    clock::{Clock, SystemClock},
    payment::PayInvoice,
};

use crate::{body::RequestBody, transport::HttpTransport};

/// What to do with invoices that do not encode an amount.
///
/// Such invoices cannot be checked against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownAmountPolicy {
    /// Pay without a budget check, and leave them out of the budget and ledger.
    #[default]
    Allow,
    /// Refuse with [`Error::UnknownAmount`](l402_core::errors::Error::UnknownAmount) before paying.
    Reject,
}

/// Configuration of an [`L402Client`](crate::client::L402Client).
///
/// The defaults:
/// - Discover a payment backend from the environment (see [`discovery`](crate::discovery))
/// - Enforce [`BudgetConfig::default`](l402_core::budget::BudgetConfig) limits
/// - Cache up to 256 credentials for one hour
/// - Pay invoices without an amount
/// - Send requests with `reqwest`
#[derive(Builder)]
pub struct ClientConfig {
    /// Payment backend. Discovered from the environment when omitted.
    pub payment: Option<Arc<dyn PayInvoice>>,
    /// Whether to look for a payment backend in the environment when `payment` is omitted.
    #[builder(default = true)]
    pub discover_payment: bool,
    /// Spending limits, or [`BudgetPolicy::Disabled`].
    #[builder(default, into)]
    pub budget: BudgetPolicy,
    /// Credential cache sizing and expiry.
    #[builder(default)]
    pub credential_cache: CacheConfig,
    /// Headers sent with every request unless overridden per call.
    #[builder(default)]
    pub request_defaults: HeaderMap,
    /// Handling of invoices without an amount.
    #[builder(default)]
    pub unknown_amount: UnknownAmountPolicy,
    /// HTTP transport. A default [`ReqwestTransport`](crate::transport::ReqwestTransport) when omitted.
    pub transport: Option<Arc<dyn HttpTransport>>,
    /// Time source for budgets, credential expiry and the ledger.
    #[builder(default = Arc::new(SystemClock) as Arc<dyn Clock>)]
    pub clock: Arc<dyn Clock>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig::builder().build()
    }
}

/// Options of a single request.
#[derive(Builder, Debug, Default)]
pub struct RequestOptions {
    #[builder(default)]
    pub method: Method,
    /// Merged over the client's default headers; a name given here replaces the default.
    #[builder(default)]
    pub headers: HeaderMap,
    #[builder(default, into)]
    pub body: RequestBody,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        RequestOptions {
            method,
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }
}

/// Default headers overlaid with per-request headers, by header name.
pub(crate) fn merge_headers(defaults: &HeaderMap, overrides: &HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in overrides.keys() {
        merged.remove(name);
    }
    for (name, value) in overrides {
        merged.append(name.clone(), value.clone());
    }
    merged
}
