#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Response, StatusCode, header::WWW_AUTHENTICATE};
use l402_kit::{
    BoxError, PayInvoice,
    transport::{HttpRequest, HttpTransport},
};
use parking_lot::Mutex;

pub const MACAROON: &str = "mac1";
pub const PREIMAGE: &str = "p1";
/// 10 micro-BTC, 1000 sats.
pub const INVOICE: &str = "lnbc10u1pvjluezpp5qqqsyqcyq5";
/// No amount.
pub const ANY_AMOUNT_INVOICE: &str = "lnbc1pvjluezpp5qqqsyqcyq5rqwzqf";

pub fn challenge_response(macaroon: &str, invoice: &str) -> Response<Bytes> {
    Response::builder()
        .status(StatusCode::PAYMENT_REQUIRED)
        .header(
            WWW_AUTHENTICATE,
            format!(r#"L402 macaroon="{macaroon}", invoice="{invoice}""#),
        )
        .body(Bytes::from_static(b"payment required"))
        .unwrap()
}

pub fn response(status: StatusCode, body: &'static str) -> Response<Bytes> {
    Response::builder()
        .status(status)
        .body(Bytes::from_static(body.as_bytes()))
        .unwrap()
}

/// Replays scripted responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Response<Bytes>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = Response<Bytes>>) -> Arc<Self> {
        Arc::new(ScriptedTransport {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<Response<Bytes>, BoxError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| "no scripted response left".into())
    }
}

/// Serves 200 to requests carrying `L402 mac1:p1` and a challenge to everything else.
#[derive(Default)]
pub struct PaywallTransport {
    pub calls: AtomicUsize,
}

#[async_trait]
impl HttpTransport for PaywallTransport {
    async fn send(&self, request: HttpRequest) -> Result<Response<Bytes>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let expected = format!("L402 {MACAROON}:{PREIMAGE}");
        let authorized = request
            .headers
            .get(http::header::AUTHORIZATION)
            .is_some_and(|value| value == expected.as_str());

        Ok(if authorized {
            response(StatusCode::OK, "paid content")
        } else {
            challenge_response(MACAROON, INVOICE)
        })
    }
}

/// Returns a fixed result and counts the invoices it was asked to pay.
pub struct MockPayment {
    result: Box<dyn Fn() -> Result<String, BoxError> + Send + Sync>,
    invoices: Mutex<Vec<String>>,
}

impl MockPayment {
    pub fn paying(preimage: &'static str) -> Arc<Self> {
        Self::with(move || Ok(preimage.to_string()))
    }

    pub fn with(result: impl Fn() -> Result<String, BoxError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(MockPayment {
            result: Box::new(result),
            invoices: Mutex::new(Vec::new()),
        })
    }

    pub fn invoices(&self) -> Vec<String> {
        self.invoices.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.invoices.lock().len()
    }
}

#[async_trait]
impl PayInvoice for MockPayment {
    async fn pay_invoice(&self, invoice: &str) -> Result<String, BoxError> {
        self.invoices.lock().push(invoice.to_string());
        (self.result)()
    }
}
