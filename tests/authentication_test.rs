//! Bearer token authentication through the full application pipeline.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;

use axum::{Json, http::StatusCode};
use serde_json::{Value, json};
use service_scaffold::{
    AppOptions, Application, Router,
    extractors::Principal,
    middleware::auth::{AuthenticationOptions, TokenVerifier, authentication},
};

use common::{
    HS_SECRET, KID, RSA_PUBLIC_PEM, authorized_get, get_request, hs256_token, now, rs256_token, send,
    spawn_jwks,
};

async fn whoami(principal: Principal) -> Json<Value> {
    Json(json!({ "sub": principal.subject(), "permissions": principal.permissions }))
}

fn app(options: AuthenticationOptions) -> axum::Router {
    let verifier = Arc::new(TokenVerifier::new(&options));
    let routes = Router::new().get("whoami", "/me", whoami);
    let routes = authentication::apply(routes, verifier);

    Application::new(AppOptions::new("auth-test"), ())
        .merge(routes)
        .router()
}

fn static_secret() -> AuthenticationOptions {
    AuthenticationOptions {
        public_key: Some(HS_SECRET.to_string()),
        ..AuthenticationOptions::default()
    }
}

#[tokio::test]
async fn header_problems_have_distinct_messages() {
    let cases = [
        (None, "Unauthorized"),
        (Some("Basic dXNlcjpwYXNz"), "Invalid authorization header"),
        (Some("Bearer"), "No authorization token provided"),
        (Some("Bearer "), "No authorization token provided"),
        (Some(" Bearer abc"), "Invalid authorization header"),
        (Some("Bearer not-a-jwt"), "Invalid token provided"),
    ];

    for (header, expected) in cases {
        let request = match header {
            Some(value) => authorized_get("/me", value),
            None => get_request("/me"),
        };
        let response = send(app(static_secret()), request).await;

        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "header {header:?}");
        assert_eq!(response.error_message(), expected, "header {header:?}");
    }
}

#[tokio::test]
async fn token_without_kid_is_invalid() {
    let token = hs256_token(None, &json!({ "sub": "u1" }));
    let response = send(app(static_secret()), authorized_get("/me", &format!("Bearer {token}"))).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_message(), "Invalid token provided");
}

#[tokio::test]
async fn static_secret_authenticates_and_exposes_principal() {
    let token = hs256_token(
        Some(KID),
        &json!({ "sub": "u1", "permissions": ["orders:read"], "exp": now() + 300 }),
    );
    let response = send(app(static_secret()), authorized_get("/me", &format!("Bearer {token}"))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "sub": "u1", "permissions": ["orders:read"] }));
}

#[tokio::test]
async fn static_rsa_public_key_authenticates() {
    let options = AuthenticationOptions {
        public_key: Some(RSA_PUBLIC_PEM.to_string()),
        ..AuthenticationOptions::default()
    };
    let token = rs256_token(Some(KID), &json!({ "sub": "u2" }));
    let response = send(app(options), authorized_get("/me", &format!("Bearer {token}"))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["sub"], "u2");
}

#[tokio::test]
async fn bad_signature_and_expiry_are_unauthorized() {
    let forged = {
        let token = hs256_token(Some(KID), &json!({ "sub": "u1" }));
        let (head, _) = token.rsplit_once('.').unwrap();
        format!("{head}.c2lnbmF0dXJl")
    };
    let expired = hs256_token(Some(KID), &json!({ "sub": "u1", "exp": now() - 3600 }));
    let not_yet = hs256_token(Some(KID), &json!({ "sub": "u1", "nbf": now() + 3600 }));

    for token in [forged, expired, not_yet] {
        let response = send(app(static_secret()), authorized_get("/me", &format!("Bearer {token}"))).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(response.error_message(), "Unauthorized");
    }
}

#[tokio::test]
async fn issuer_and_audience_are_enforced_when_configured() {
    let options = AuthenticationOptions {
        issuer: Some("https://issuer.example".to_string()),
        audience: Some("orders-api".to_string()),
        ..static_secret()
    };

    let good = hs256_token(
        Some(KID),
        &json!({ "sub": "u1", "iss": "https://issuer.example", "aud": "orders-api" }),
    );
    let wrong_issuer = hs256_token(
        Some(KID),
        &json!({ "sub": "u1", "iss": "https://other.example", "aud": "orders-api" }),
    );

    let response = send(app(options.clone()), authorized_get("/me", &format!("Bearer {good}"))).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = send(app(options), authorized_get("/me", &format!("Bearer {wrong_issuer}"))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_message(), "Unauthorized");
}

#[tokio::test]
async fn jwks_key_is_resolved_by_kid() {
    let jwks = spawn_jwks().await;
    let options = AuthenticationOptions {
        jwks_uri: Some(jwks.uri.clone()),
        ..AuthenticationOptions::default()
    };

    let token = rs256_token(Some(KID), &json!({ "sub": "remote", "exp": now() + 300 }));
    let response = send(app(options), authorized_get("/me", &format!("Bearer {token}"))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["sub"], "remote");
    assert_eq!(jwks.hits(), 1);
}

#[tokio::test]
async fn unknown_kid_cannot_retrieve_signing_key() {
    let jwks = spawn_jwks().await;
    let options = AuthenticationOptions {
        jwks_uri: Some(jwks.uri.clone()),
        ..AuthenticationOptions::default()
    };

    let token = rs256_token(Some("rotated-away"), &json!({ "sub": "remote" }));
    let response = send(app(options), authorized_get("/me", &format!("Bearer {token}"))).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_message(), "Could not retrieve signing key");
}

#[tokio::test]
async fn unreachable_jwks_cannot_retrieve_signing_key() {
    let options = AuthenticationOptions {
        jwks_uri: Some("http://127.0.0.1:9/.well-known/jwks.json".to_string()),
        ..AuthenticationOptions::default()
    };

    let token = rs256_token(Some(KID), &json!({ "sub": "remote" }));
    let response = send(app(options), authorized_get("/me", &format!("Bearer {token}"))).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_message(), "Could not retrieve signing key");
}

#[tokio::test]
async fn cached_keys_skip_the_network() {
    let jwks = spawn_jwks().await;
    let cached = app(AuthenticationOptions {
        jwks_uri: Some(jwks.uri.clone()),
        cache: true,
        ..AuthenticationOptions::default()
    });

    let token = rs256_token(Some(KID), &json!({ "sub": "remote" }));
    for _ in 0..3 {
        let response = send(cached.clone(), authorized_get("/me", &format!("Bearer {token}"))).await;
        assert_eq!(response.status, StatusCode::OK);
    }
    assert_eq!(jwks.hits(), 1);

    let uncached_jwks = spawn_jwks().await;
    let uncached = app(AuthenticationOptions {
        jwks_uri: Some(uncached_jwks.uri.clone()),
        ..AuthenticationOptions::default()
    });
    for _ in 0..2 {
        let response = send(uncached.clone(), authorized_get("/me", &format!("Bearer {token}"))).await;
        assert_eq!(response.status, StatusCode::OK);
    }
    assert_eq!(uncached_jwks.hits(), 2);
}

#[tokio::test]
async fn unprotected_routes_stay_open() {
    let response = send(app(static_secret()), get_request("/healthz")).await;
    assert_eq!(response.status, StatusCode::OK);
}
