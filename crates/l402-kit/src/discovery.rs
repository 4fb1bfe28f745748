//! Locating a payment backend when none is configured explicitly.
//!
//! Sources are tried in order:
//!
//! 1. A TOML file named by `L402_CONFIG`:
//!
//!    ```toml
//!    [payment]
//!    backend = "lnbits"
//!    url = "https://lnbits.example.com/"
//!    admin_key = "..."
//!    ```
//!
//! 2. `LNBITS_URL` together with `LNBITS_ADMIN_KEY`.
//! 3. `ALBY_ACCESS_TOKEN`, optionally with `ALBY_API_URL`.

use std::{path::Path, sync::Arc};

use l402_core::payment::PayInvoice;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::backends::{alby::AlbyBackend, lnbits::LnbitsBackend};

pub const CONFIG_PATH_VAR: &str = "L402_CONFIG";
pub const LNBITS_URL_VAR: &str = "LNBITS_URL";
pub const LNBITS_ADMIN_KEY_VAR: &str = "LNBITS_ADMIN_KEY";
pub const ALBY_ACCESS_TOKEN_VAR: &str = "ALBY_ACCESS_TOKEN";
pub const ALBY_API_URL_VAR: &str = "ALBY_API_URL";

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid {var}: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },
}

/// Settings of one payment backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum PaymentSettings {
    Lnbits {
        url: Url,
        admin_key: String,
    },
    Alby {
        access_token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<Url>,
    },
}

impl PaymentSettings {
    pub fn into_backend(self) -> Arc<dyn PayInvoice> {
        match self {
            PaymentSettings::Lnbits { url, admin_key } => Arc::new(
                LnbitsBackend::builder()
                    .base_url(url)
                    .admin_key(admin_key)
                    .build(),
            ),
            PaymentSettings::Alby {
                access_token,
                base_url,
            } => Arc::new(
                AlbyBackend::builder()
                    .access_token(access_token)
                    .maybe_base_url(base_url)
                    .build(),
            ),
        }
    }
}

/// Contents of the `L402_CONFIG` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub payment: PaymentSettings,
}

pub fn load_config_file(path: impl AsRef<Path>) -> Result<ConfigFile, DiscoveryError> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

/// Resolve backend settings from variables provided by `lookup`.
///
/// Empty values count as unset.
pub fn settings_from_vars(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<PaymentSettings>, DiscoveryError> {
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(path) = var(CONFIG_PATH_VAR) {
        return Ok(Some(load_config_file(path)?.payment));
    }

    if let (Some(url), Some(admin_key)) = (var(LNBITS_URL_VAR), var(LNBITS_ADMIN_KEY_VAR)) {
        let url = Url::parse(&url).map_err(|source| DiscoveryError::InvalidUrl {
            var: LNBITS_URL_VAR,
            source,
        })?;
        return Ok(Some(PaymentSettings::Lnbits { url, admin_key }));
    }

    if let Some(access_token) = var(ALBY_ACCESS_TOKEN_VAR) {
        let base_url = var(ALBY_API_URL_VAR)
            .map(|url| Url::parse(&url))
            .transpose()
            .map_err(|source| DiscoveryError::InvalidUrl {
                var: ALBY_API_URL_VAR,
                source,
            })?;
        return Ok(Some(PaymentSettings::Alby {
            access_token,
            base_url,
        }));
    }

    Ok(None)
}

/// Build a payment backend from the process environment.
///
/// Returns `None` when nothing is configured or the configuration is invalid.
pub fn discover_payment() -> Option<Arc<dyn PayInvoice>> {
    match settings_from_vars(|name| std::env::var(name).ok()) {
        Ok(Some(settings)) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Discovered {} payment backend",
                match &settings {
                    PaymentSettings::Lnbits { .. } => "LNbits",
                    PaymentSettings::Alby { .. } => "Alby",
                }
            );
            Some(settings.into_backend())
        }
        Ok(None) => None,
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Ignoring payment backend configuration: {_err}");
            None
        }
    }
}
