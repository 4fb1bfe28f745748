//! # L402 Kit
//!
//! An HTTP client that pays for resources guarded by L402 Lightning challenges.
//!
//! When a server answers `402 Payment Required` with
//! `WWW-Authenticate: L402 macaroon="...", invoice="lnbc..."`, [`L402Client`](client::L402Client)
//! checks the invoice amount against its budget, pays it through a [`PayInvoice`] backend,
//! caches the credential and retries the request with `Authorization: L402 <macaroon>:<preimage>`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use l402_kit::{
//!     backends::lnbits::LnbitsBackend,
//!     client::L402Client,
//!     config::ClientConfig,
//!     l402_core::budget::BudgetConfig,
//! };
//! use url::Url;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = LnbitsBackend::builder()
//!     .base_url(Url::parse("https://lnbits.example.com/")?)
//!     .admin_key("admin-key")
//!     .build();
//!
//! let client = L402Client::new(
//!     ClientConfig::builder()
//!         .payment(Arc::new(backend))
//!         .budget(BudgetConfig::builder().max_per_request(500).build())
//!         .build(),
//! );
//!
//! let response = client.get("https://api.example.com/v1/quote").await?;
//! println!("{} after spending {} sats", response.status(), client.ledger().total_spent());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the [`L402Client`](client::L402Client) and its payment flow.
//! - [`config`]: client and per-request options.
//! - [`transport`]: the HTTP seam and its `reqwest` implementation.
//! - [`body`]: request bodies that can be sent twice.
//! - [`backends`]: REST payment backends (LNbits, Alby).
//! - [`discovery`]: locating a payment backend from the environment or a config file.
//! - [`global`]: a process-wide default client and top-level helpers.
//! - [`errors`]: client error type.

pub mod backends;
pub mod body;
pub mod client;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod global;
pub mod transport;

pub use l402_core;
pub use l402_core::payment::{BoxError, PayInvoice};
