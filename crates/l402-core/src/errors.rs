use std::fmt::Display;

/// Which spending limit rejected a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitType {
    PerRequest,
    PerHour,
    PerDay,
}

impl LimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitType::PerRequest => "per_request",
            LimitType::PerHour => "per_hour",
            LimitType::PerDay => "per_day",
        }
    }
}

impl Display for LimitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid L402 challenge: {0}")]
    ChallengeParse(String),

    #[error("Domain not allowed for payments: {domain}")]
    DomainNotAllowed { domain: String },

    #[error(
        "Budget exceeded ({limit_type}): limit {limit} sats, already spent {current} sats, requested {requested} sats"
    )]
    BudgetExceeded {
        limit_type: LimitType,
        limit: u64,
        current: u64,
        requested: u64,
    },

    #[error("Payment failed: {reason}")]
    PaymentFailed { reason: String, invoice: String },

    #[error("Invoice expired: {invoice}")]
    InvoiceExpired { invoice: String },

    #[error("No payment method configured")]
    NoPaymentCapability,

    #[error("Invoice does not encode an amount and unknown amounts are not allowed: {invoice}")]
    UnknownAmount { invoice: String },
}

pub type Result<T> = std::result::Result<T, Error>;
