use std::{collections::HashMap, io::Write};

use l402_kit::discovery::{
    DiscoveryError, PaymentSettings, load_config_file, settings_from_vars,
};
use url::Url;

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn test_nothing_configured() {
    assert_eq!(settings_from_vars(vars(&[])).unwrap(), None);
    assert_eq!(
        settings_from_vars(vars(&[("LNBITS_URL", "https://lnbits.example.com/")])).unwrap(),
        None
    );
}

#[test]
fn test_lnbits_from_vars() {
    let settings = settings_from_vars(vars(&[
        ("LNBITS_URL", "https://lnbits.example.com/"),
        ("LNBITS_ADMIN_KEY", "admin-key"),
        ("ALBY_ACCESS_TOKEN", "token"),
    ]))
    .unwrap();

    assert_eq!(
        settings,
        Some(PaymentSettings::Lnbits {
            url: Url::parse("https://lnbits.example.com/").unwrap(),
            admin_key: "admin-key".to_string(),
        })
    );
}

#[test]
fn test_alby_from_vars() {
    let settings = settings_from_vars(vars(&[
        ("ALBY_ACCESS_TOKEN", "token"),
        ("LNBITS_ADMIN_KEY", ""),
    ]))
    .unwrap();

    assert_eq!(
        settings,
        Some(PaymentSettings::Alby {
            access_token: "token".to_string(),
            base_url: None,
        })
    );
}

#[test]
fn test_invalid_url_is_reported() {
    let err = settings_from_vars(vars(&[
        ("LNBITS_URL", "not a url"),
        ("LNBITS_ADMIN_KEY", "admin-key"),
    ]))
    .unwrap_err();

    assert!(matches!(
        err,
        DiscoveryError::InvalidUrl {
            var: "LNBITS_URL",
            ..
        }
    ));
}

#[test]
fn test_config_file_takes_precedence() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[payment]
backend = "alby"
access_token = "from-file"
base_url = "https://alby.internal/"
"#
    )
    .unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let settings = settings_from_vars(vars(&[
        ("L402_CONFIG", path.as_str()),
        ("LNBITS_URL", "https://lnbits.example.com/"),
        ("LNBITS_ADMIN_KEY", "admin-key"),
    ]))
    .unwrap();

    assert_eq!(
        settings,
        Some(PaymentSettings::Alby {
            access_token: "from-file".to_string(),
            base_url: Some(Url::parse("https://alby.internal/").unwrap()),
        })
    );
}

#[test]
fn test_config_file_lnbits() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[payment]
backend = "lnbits"
url = "https://lnbits.example.com/"
admin_key = "admin-key"
"#
    )
    .unwrap();

    let config = load_config_file(file.path()).unwrap();
    assert_eq!(
        config.payment,
        PaymentSettings::Lnbits {
            url: Url::parse("https://lnbits.example.com/").unwrap(),
            admin_key: "admin-key".to_string(),
        }
    );
    // Builds without touching the network.
    let _backend = config.payment.into_backend();
}

#[test]
fn test_bad_config_file() {
    let missing = settings_from_vars(vars(&[("L402_CONFIG", "/nonexistent/l402.toml")]));
    assert!(matches!(missing, Err(DiscoveryError::Io(_))));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[payment]\nbackend = \"carrier-pigeon\"").unwrap();
    assert!(matches!(
        load_config_file(file.path()),
        Err(DiscoveryError::Toml(_))
    ));
}
