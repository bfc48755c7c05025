//! Generic HTTP event: `{method, path|url, headers, query, body, isBase64Encoded}`.
//!
//! Also used for Google Cloud JSON invocations; real HTTP requests from Cloud
//! Functions go through `ServerlessHandler::call` instead.

use axum::extract::Request;
use serde_json::{Value, json};

use super::{EventRequest, ReplyParts, ServerlessError, read_body, read_headers, read_query, write_body, write_headers};

pub(crate) fn request(event: &Value) -> Result<Request, ServerlessError> {
    if !event.is_object() {
        return Err(ServerlessError::InvalidEvent("expected an HTTP event object".to_string()));
    }

    let method = event
        .get("method")
        .or_else(|| event.get("httpMethod"))
        .and_then(Value::as_str)
        .unwrap_or("GET")
        .to_string();

    let target = event
        .get("path")
        .or_else(|| event.get("url"))
        .and_then(Value::as_str)
        .unwrap_or("/");
    let (path, raw_query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    };

    let is_base64 = event
        .get("isBase64Encoded")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    EventRequest {
        method,
        path,
        query: read_query(event.get("query")),
        raw_query,
        headers: read_headers(event.get("headers")),
        body: read_body(event.get("body"), is_base64)?,
    }
    .into_request()
}

pub(crate) fn response(reply: ReplyParts) -> Value {
    let headers = write_headers(&reply.headers);
    let (body, is_base64_encoded) = write_body(&reply.headers, &reply.body);

    json!({
        "statusCode": reply.status,
        "headers": headers,
        "body": body,
        "isBase64Encoded": is_base64_encoded,
    })
}
