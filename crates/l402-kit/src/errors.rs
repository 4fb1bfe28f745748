use l402_core::{errors::Error, payment::BoxError};

/// Errors returned by [`L402Client`](crate::client::L402Client).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Budget, domain, challenge or payment errors, passed through unchanged.
    #[error(transparent)]
    L402(#[from] Error),
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("Failed to read request body: {0}")]
    BodyError(std::io::Error),
    #[error("HTTP request error: {0}")]
    HttpRequestError(BoxError),
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

impl ClientError {
    /// The L402 error, if this is one.
    pub fn as_l402(&self) -> Option<&Error> {
        match self {
            ClientError::L402(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
