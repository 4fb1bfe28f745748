//! L402 challenges carried in `WWW-Authenticate` headers.
//!
//! A server asking for payment answers `402 Payment Required` with
//!
//! ```text
//! WWW-Authenticate: L402 macaroon="<credential id>", invoice="<bolt11 invoice>"
//! ```
//!
//! and expects the retried request to carry `Authorization: L402 <credential id>:<preimage>`.
//! The legacy `LSAT` scheme name is accepted as well, and values may be unquoted.

use std::sync::LazyLock;

use http::{HeaderMap, header::WWW_AUTHENTICATE};
use regex::Regex;

use crate::errors::{Error, Result};

/// Current authorization scheme name.
pub const SCHEME: &str = "L402";
/// Legacy authorization scheme name.
pub const LEGACY_SCHEME: &str = "LSAT";

const CREDENTIAL_KEYS: &[&str] = &["macaroon", "token"];
const INVOICE_KEYS: &[&str] = &["invoice"];

static QUOTED_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[\s,])([A-Za-z]+)\s*=\s*"([^"]*)""#).expect("valid quoted param regex")
});

static UNQUOTED_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[\s,])([A-Za-z]+)\s*=\s*([^\s,"]+)"#).expect("valid unquoted param regex")
});

/// A parsed payment challenge: the credential to present once the invoice is paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Credential identifier (the macaroon).
    pub credential_id: String,
    /// BOLT11 invoice to pay.
    pub invoice: String,
}

impl Challenge {
    /// Parse a single challenge header value.
    pub fn parse(header: &str) -> Result<Challenge> {
        let header = header.trim();
        if header.is_empty() {
            return Err(Error::ChallengeParse("empty challenge header".to_string()));
        }

        let (scheme, params) = header
            .split_once(char::is_whitespace)
            .ok_or_else(|| Error::ChallengeParse(format!("missing challenge parameters: {header}")))?;

        if !is_l402_scheme(scheme) {
            return Err(Error::ChallengeParse(format!(
                "unsupported authentication scheme: {scheme}"
            )));
        }

        let credential_id = find_param(params, CREDENTIAL_KEYS)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::ChallengeParse("missing macaroon".to_string()))?;
        let invoice = find_param(params, INVOICE_KEYS)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::ChallengeParse("missing invoice".to_string()))?;

        Ok(Challenge {
            credential_id,
            invoice,
        })
    }
}

/// Find the first L402 challenge among the `WWW-Authenticate` headers of a response.
///
/// Returns `None` when there is no such header or none of them parse: a 402 without an L402
/// challenge belongs to some other protocol and is not an error.
pub fn find_challenge(headers: &HeaderMap) -> Option<Challenge> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            Challenge::parse(value)
                .ok()
                .or_else(|| locate_scheme(value).and_then(|at| Challenge::parse(&value[at..]).ok()))
        })
}

/// Render the `Authorization` header value for a paid credential.
pub fn authorization_value(credential_id: &str, proof: &str) -> String {
    format!("{SCHEME} {credential_id}:{proof}")
}

fn is_l402_scheme(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case(SCHEME) || scheme.eq_ignore_ascii_case(LEGACY_SCHEME)
}

/// Offset of an L402 scheme token inside a header listing several challenges.
fn locate_scheme(value: &str) -> Option<usize> {
    let mut offset = 0;
    for token in value.split_inclusive(|c: char| c.is_whitespace() || c == ',') {
        let word = token.trim_end_matches(|c: char| c.is_whitespace() || c == ',');
        if is_l402_scheme(word) {
            return Some(offset);
        }
        offset += token.len();
    }
    None
}

fn find_param(params: &str, keys: &[&str]) -> Option<String> {
    [&*QUOTED_PARAM, &*UNQUOTED_PARAM].into_iter().find_map(|re| {
        re.captures_iter(params)
            .find(|caps| keys.iter().any(|k| caps[1].eq_ignore_ascii_case(k)))
            .map(|caps| caps[2].to_string())
    })
}
