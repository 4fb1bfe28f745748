//! Payable amounts encoded in BOLT11 invoices.
//!
//! Only the human-readable prefix is read: `ln` + network + optional amount + `1`.
//! The amount is a digit run followed by an optional multiplier:
//!
//! | multiplier | scale         |
//! |------------|---------------|
//! | (none)     | 1 BTC         |
//! | `m`        | 1/1 000       |
//! | `u`        | 1/1 000 000   |
//! | `n`        | 1/10^9        |
//! | `p`        | 1/10^12       |
//!
//! Conversion to satoshis is done in 256-bit integers and truncates toward zero.

use std::sync::LazyLock;

use alloy_primitives::U256;
use regex::Regex;

/// Satoshis per bitcoin.
pub const SATS_PER_BTC: u64 = 100_000_000;

static INVOICE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ln[a-z]+?(?:([0-9]+)([munp])?)?1").expect("valid invoice prefix regex")
});

/// Extract the amount of an invoice in satoshis.
///
/// Returns `None` for "any amount" invoices and for strings that are not invoices.
/// Amounts too large for a `u64` saturate to `u64::MAX`.
///
/// ```
/// use l402_core::amount::extract_amount;
///
/// assert_eq!(extract_amount("lnbc10u1pjexample"), Some(1_000));
/// assert_eq!(extract_amount("lnbc1pjexample"), None);
/// ```
pub fn extract_amount(invoice: &str) -> Option<u64> {
    let invoice = invoice.trim().to_ascii_lowercase();
    let caps = INVOICE_PREFIX.captures(&invoice)?;
    let digits = caps.get(1)?.as_str();

    let (numerator, denominator) = multiplier_scale(caps.get(2).map(|m| m.as_str()));

    let sats = digits
        .parse::<U256>()
        .ok()
        .and_then(|amount| amount.checked_mul(U256::from(SATS_PER_BTC)))
        .and_then(|scaled| scaled.checked_mul(U256::from(numerator)))
        .map(|scaled| scaled / U256::from(denominator));

    Some(match sats {
        Some(sats) => u64::try_from(sats).unwrap_or(u64::MAX),
        None => u64::MAX,
    })
}

/// Exact rational scale of a multiplier relative to one bitcoin.
fn multiplier_scale(multiplier: Option<&str>) -> (u64, u64) {
    match multiplier {
        Some("m") => (1, 1_000),
        Some("u") => (1, 1_000_000),
        Some("n") => (1, 1_000_000_000),
        Some("p") => (1, 1_000_000_000_000),
        _ => (1, 1),
    }
}
