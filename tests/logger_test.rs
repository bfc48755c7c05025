//! Correlation id assignment and propagation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use service_scaffold::{AppError, AppOptions, Application, Router, extractors::CorrelationId};
use uuid::Uuid;

use common::{get_request, send};

const HEADER: &str = "x-correlation-id";

async fn echo_id(id: CorrelationId) -> String {
    id.to_string()
}

async fn fail(id: CorrelationId) -> Result<String, AppError> {
    Err(AppError::internal(format!("failed while handling {id}")))
}

fn app() -> axum::Router {
    let routes = Router::new()
        .get("echo id", "/id", echo_id)
        .get("fail", "/fail", fail);

    Application::new(AppOptions::new("logger-test"), ())
        .merge(routes)
        .router()
}

#[tokio::test]
async fn generates_a_uuid_when_absent() {
    let response = send(app(), get_request("/id")).await;

    assert_eq!(response.status, StatusCode::OK);
    let id = response.header(HEADER).unwrap();
    assert!(Uuid::parse_str(id).is_ok(), "not a uuid: {id}");
    assert_eq!(response.text(), id, "handler and response disagree");
}

#[tokio::test]
async fn reuses_the_incoming_id() {
    let request = Request::builder()
        .uri("/id")
        .header(HEADER, "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = send(app(), request).await;

    assert_eq!(response.header(HEADER), Some("abc-123"));
    assert_eq!(response.text(), "abc-123");
}

#[tokio::test]
async fn blank_incoming_ids_are_replaced() {
    for blank in ["", "   "] {
        let request = Request::builder()
            .uri("/id")
            .header(HEADER, blank)
            .body(Body::empty())
            .unwrap();
        let response = send(app(), request).await;

        let id = response.header(HEADER).unwrap();
        assert!(Uuid::parse_str(id).is_ok(), "not a uuid: {id:?}");
        assert_eq!(response.text(), id);
    }
}

#[tokio::test]
async fn failures_keep_the_id_and_pass_through() {
    let request = Request::builder()
        .uri("/fail")
        .header(HEADER, "trace-me")
        .body(Body::empty())
        .unwrap();
    let response = send(app(), request).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.header(HEADER), Some("trace-me"));
}

#[tokio::test]
async fn unknown_routes_still_get_an_id() {
    let response = send(app(), get_request("/nowhere")).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.header(HEADER).is_some());
}

#[tokio::test]
async fn each_request_gets_its_own_id() {
    let first = send(app(), get_request("/id")).await;
    let second = send(app(), get_request("/id")).await;

    assert_ne!(first.header(HEADER), second.header(HEADER));
}
