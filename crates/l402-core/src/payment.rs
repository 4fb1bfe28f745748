//! The payment capability the client depends on.

use async_trait::async_trait;

/// Boxed error returned by payment backends and transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Anything that can settle a Lightning invoice and hand back the proof of payment.
///
/// Implementations return the payment preimage on success. Failures are opaque to the
/// client, except that an [`Error`](crate::errors::Error) returned here is passed to the
/// caller unchanged instead of being wrapped in [`Error::PaymentFailed`](crate::errors::Error::PaymentFailed).
#[async_trait]
pub trait PayInvoice: Send + Sync {
    async fn pay_invoice(&self, invoice: &str) -> Result<String, BoxError>;
}
