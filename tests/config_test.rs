//! `Config::from_env` against the real process environment.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use serial_test::serial;
use service_scaffold::{AppOptions, config::Config};

const KEYS: [&str; 5] = [
    "APP_NAME",
    "PORT",
    "BODY_LIMIT_BYTES",
    "HEALTHZ_ENDPOINT",
    "JWKS_URI",
];

fn clear() {
    for key in KEYS {
        // SAFETY: tests touching the environment run serially.
        unsafe { std::env::remove_var(key) };
    }
}

fn set(key: &str, value: &str) {
    // SAFETY: tests touching the environment run serially.
    unsafe { std::env::set_var(key, value) };
}

#[test]
#[serial]
fn reads_the_process_environment() {
    clear();
    set("APP_NAME", "orders");
    set("PORT", "8081");
    set("BODY_LIMIT_BYTES", "2048");
    set("HEALTHZ_ENDPOINT", "/livez");
    set("JWKS_URI", "https://issuer.example/.well-known/jwks.json");

    let config = Config::from_env().unwrap();
    clear();

    assert_eq!(config.name, "orders");
    assert_eq!(config.port, 8081);

    let auth = config.authentication_options();
    assert_eq!(auth.jwks_uri.as_deref(), Some("https://issuer.example/.well-known/jwks.json"));
    assert!(auth.public_key.is_none());

    let options: AppOptions<()> = AppOptions::from_config(&config);
    assert_eq!(options.name, "orders");
    assert_eq!(options.body.limit, 2048);
    assert_eq!(options.healthz.endpoint, "/livez");
}

#[test]
#[serial]
fn invalid_values_fail_startup() {
    clear();
    set("PORT", "eighty");

    let result = Config::from_env();
    clear();

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "invalid configuration: PORT");
}
