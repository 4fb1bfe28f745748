//! L402 core library.
//!
//! Protocol types and the payment policy engine used by L402 clients:
//!
//! - [`challenge`]: parse `WWW-Authenticate: L402 ...` challenges.
//! - [`amount`]: read the payable amount out of a BOLT11 invoice prefix.
//! - [`budget`]: rolling-window spending limits and domain allow-lists.
//! - [`cache`]: bounded, expiring credential cache keyed by resource group.
//! - [`ledger`]: append-only record of payment attempts.
//! - [`payment`]: the [`PayInvoice`](payment::PayInvoice) capability backends implement.

pub mod amount;
pub mod budget;
pub mod cache;
pub mod challenge;
pub mod clock;
pub mod errors;
pub mod ledger;
pub mod payment;
