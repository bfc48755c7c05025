//! Error translation.
//!
//! Responsibility:
//! - Turn every `AppError` produced by an inner stage into the JSON error envelope
//!   (exposed errors keep their message, hidden ones get the status reason only)
//! - Catch panics in inner stages and report them as hidden 500s
//! - Leave transport-level responses (router 404/405, extractor rejections,
//!   CORS preflights) untouched
//!
//! The `AppError` stays in the response extensions so the access log sees it.

use std::any::Any;

use axum::{
    Json, Router,
    body::Body,
    extract::Request,
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::AppError;

pub fn apply<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let layers = ServiceBuilder::new()
        .layer(middleware::from_fn(translate_errors))
        .layer(CatchPanicLayer::custom(panic_response));

    router.layer(layers)
}

async fn translate_errors(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let Some(err) = response.extensions().get::<AppError>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    let (body_parts, body) = Json(err.to_error_response()).into_response().into_parts();

    parts.status = err.status();
    parts.headers.remove(header::CONTENT_LENGTH);
    if let Some(content_type) = body_parts.headers.get(header::CONTENT_TYPE) {
        parts.headers.insert(header::CONTENT_TYPE, content_type.clone());
    }

    Response::from_parts(parts, Body::new(body))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic payload".to_string());

    AppError::internal(format!("handler panicked: {detail}")).into_response()
}
