//! Request logging (outermost stage).
//!
//! Responsibility:
//! - Correlation id: reuse a non-blank `x-correlation-id` from the request, or
//!   generate a UUID and write it into the request headers; echo it on the response
//! - A `request` span per request (the per-request child logger)
//! - Exactly one access log event per request with method, path, query, headers,
//!   status and duration
//!
//! Failures are logged, never swallowed: the response goes back out unchanged.

use std::time::Instant;

use axum::{
    Router,
    extract::Request,
    http::{HeaderMap, HeaderName, header},
    middleware::{self, Next},
    response::Response,
};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tracing::Instrument;

use crate::error::AppError;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

const REDACTED_HEADERS: [HeaderName; 3] = [header::AUTHORIZATION, header::COOKIE, header::PROXY_AUTHORIZATION];

pub fn apply<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let correlation_header = HeaderName::from_static(CORRELATION_ID_HEADER);

    let layers = ServiceBuilder::new()
        .layer(middleware::from_fn(drop_blank_correlation_id))
        .layer(SetRequestIdLayer::new(correlation_header.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(correlation_header))
        .layer(middleware::from_fn(access_log));

    router.layer(layers)
}

/// A blank inbound id counts as absent, so a fresh one gets generated.
async fn drop_blank_correlation_id(mut req: Request, next: Next) -> Response {
    let blank = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .is_some_and(|value| value.as_bytes().iter().all(u8::is_ascii_whitespace));
    if blank {
        req.headers_mut().remove(CORRELATION_ID_HEADER);
    }
    next.run(req).await
}

async fn access_log(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let query = req.uri().query().unwrap_or_default().to_owned();
    let headers = loggable_headers(req.headers());
    let correlation_id = req
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let span = tracing::info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
    );

    let response = next.run(req).instrument(span.clone()).await;

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let status = response.status().as_u16();

    span.in_scope(|| match response.extensions().get::<AppError>() {
        Some(err) if err.status().is_server_error() => tracing::error!(
            status,
            duration_ms,
            query = %query,
            headers = ?headers,
            error = %err,
            "request failed"
        ),
        Some(err) => tracing::warn!(
            status,
            duration_ms,
            query = %query,
            headers = ?headers,
            error = %err,
            "request rejected"
        ),
        None if response.status().is_server_error() => tracing::error!(
            status,
            duration_ms,
            query = %query,
            headers = ?headers,
            "request failed"
        ),
        None => tracing::info!(
            status,
            duration_ms,
            query = %query,
            headers = ?headers,
            "request completed"
        ),
    });

    response
}

fn loggable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if REDACTED_HEADERS.contains(name) {
                "[redacted]".to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_owned(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn credentials_never_reach_the_log() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let logged = loggable_headers(&headers);
        assert!(logged.contains(&("authorization".to_string(), "[redacted]".to_string())));
        assert!(logged.contains(&("accept".to_string(), "application/json".to_string())));
    }
}
