//! Azure Functions HTTP trigger (`req` binding shape).

use axum::extract::Request;
use serde_json::{Value, json};

use super::{EventRequest, ReplyParts, ServerlessError, read_body, read_headers, read_query, write_body, write_headers};

pub(crate) fn request(event: &Value) -> Result<Request, ServerlessError> {
    if !event.is_object() {
        return Err(ServerlessError::InvalidEvent("expected an HTTP trigger object".to_string()));
    }

    let method = event
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("GET")
        .to_string();

    let (path, raw_query) = split_url(event.get("url").and_then(Value::as_str).unwrap_or("/"));

    let body = match event.get("rawBody") {
        Some(raw @ Value::String(_)) => read_body(Some(raw), false)?,
        _ => read_body(event.get("body"), false)?,
    };

    EventRequest {
        method,
        path,
        query: read_query(event.get("query").or_else(|| event.get("params"))),
        raw_query,
        headers: read_headers(event.get("headers")),
        body,
    }
    .into_request()
}

pub(crate) fn response(reply: ReplyParts) -> Value {
    let headers = write_headers(&reply.headers);
    let (body, is_base64_encoded) = write_body(&reply.headers, &reply.body);

    json!({
        "status": reply.status,
        "headers": headers,
        "body": body,
        "isBase64Encoded": is_base64_encoded,
    })
}

/// Absolute (`https://host/api/x?y=1`) or relative (`/api/x?y=1`) URL into path + query.
fn split_url(raw: &str) -> (String, Option<String>) {
    if let Ok(url) = url::Url::parse(raw) {
        return (url.path().to_string(), url.query().map(str::to_owned));
    }

    match raw.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (raw.to_string(), None),
    }
}
