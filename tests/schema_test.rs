//! Request schema validation per fragment.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use service_scaffold::{
    AppOptions, Application, Router,
    middleware::schema::{RequestSchema, SchemaOptions, SchemaValidator},
};

use common::{get_request, json_request, send};

async fn ok() -> &'static str {
    "ok"
}

fn app(schema: RequestSchema) -> axum::Router {
    let validator = SchemaValidator::new(schema, SchemaOptions::default()).unwrap();
    let routes = Router::new()
        .get("show order", "/orders/{id}", ok)
        .post("create order", "/orders", ok);

    Application::new(AppOptions::new("schema-test"), ())
        .merge(validator.apply(routes))
        .router()
}

fn assert_rejected(response: &common::TestResponse) {
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), "Bad Request");
}

#[tokio::test]
async fn undeclared_fragments_are_not_checked() {
    let response = send(app(RequestSchema::default()), get_request("/orders/anything?x=1")).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn body_fragment() {
    let schema = RequestSchema {
        body: Some(json!({
            "type": "object",
            "required": ["sku", "qty"],
            "properties": {
                "sku": { "type": "string", "pattern": "^[A-Z]-[0-9]+$" },
                "qty": { "type": "integer", "minimum": 1 }
            }
        })),
        ..RequestSchema::default()
    };

    let response = send(app(schema.clone()), json_request("POST", "/orders", &json!({ "sku": "A-1", "qty": 2 }))).await;
    assert_eq!(response.status, StatusCode::OK);

    for body in [json!({ "sku": "A-1" }), json!({ "sku": "a1", "qty": 2 }), json!({ "sku": "A-1", "qty": 0 })] {
        let response = send(app(schema.clone()), json_request("POST", "/orders", &body)).await;
        assert_rejected(&response);
        assert!(response.json()["error"].get("details").is_none());
    }
}

#[tokio::test]
async fn query_fragment_coerces_strings() {
    let schema = RequestSchema {
        query: Some(json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "maximum": 100 },
                "expand": { "type": "boolean" }
            },
            "additionalProperties": false
        })),
        ..RequestSchema::default()
    };

    let response = send(app(schema.clone()), get_request("/orders/1?limit=25&expand=true")).await;
    assert_eq!(response.status, StatusCode::OK);

    for uri in ["/orders/1?limit=500", "/orders/1?limit=ten", "/orders/1?other=1"] {
        assert_rejected(&send(app(schema.clone()), get_request(uri)).await);
    }
}

#[tokio::test]
async fn path_fragment_uses_matched_params() {
    let schema = RequestSchema {
        path: Some(json!({
            "type": "object",
            "required": ["id"],
            "properties": { "id": { "type": "string", "format": "uuid" } }
        })),
        ..RequestSchema::default()
    };

    let response = send(
        app(schema.clone()),
        get_request("/orders/67e55044-10b1-426f-9247-bb680e5fe0c8"),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    assert_rejected(&send(app(schema), get_request("/orders/42")).await);
}

#[tokio::test]
async fn headers_fragment() {
    let schema = RequestSchema {
        headers: Some(json!({
            "type": "object",
            "required": ["x-tenant-id"],
            "properties": { "x-tenant-id": { "type": "string", "minLength": 3 } }
        })),
        ..RequestSchema::default()
    };

    let request = Request::builder()
        .uri("/orders/1")
        .header("X-Tenant-Id", "acme")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(app(schema.clone()), request).await.status, StatusCode::OK);

    assert_rejected(&send(app(schema), get_request("/orders/1")).await);
}

#[tokio::test]
async fn files_fragment_defaults_to_empty_object() {
    let schema = RequestSchema {
        files: Some(json!({ "type": "object", "required": ["upload"] })),
        ..RequestSchema::default()
    };

    assert_rejected(&send(app(schema), json_request("POST", "/orders", &json!({}))).await);
}

#[tokio::test]
async fn composite_keywords_are_enforced() {
    let schema = RequestSchema {
        body: Some(json!({
            "properties": { "kind": { "anyOf": [{ "const": "a" }, { "const": "b" }] } },
            "allOf": [{ "required": ["kind"] }]
        })),
        ..RequestSchema::default()
    };

    let response = send(app(schema.clone()), json_request("POST", "/orders", &json!({ "kind": "b" }))).await;
    assert_eq!(response.status, StatusCode::OK);

    for body in [json!({ "kind": "c" }), json!({ "qty": 1 })] {
        assert_rejected(&send(app(schema.clone()), json_request("POST", "/orders", &body)).await);
    }
}

#[test]
fn strict_mode_rejects_unknown_keywords() {
    let schema = RequestSchema {
        body: Some(json!({ "type": "object", "widget": true })),
        ..RequestSchema::default()
    };

    assert!(SchemaValidator::new(schema.clone(), SchemaOptions { strict: true, coerce_types: true }).is_err());
    assert!(SchemaValidator::new(schema, SchemaOptions::default()).is_ok());
}
