//! Serverless adapters.
//!
//! Translate provider event JSON into an `http::Request`, run it through the
//! composed application, and translate the response back. API Gateway payloads
//! are decoded with `aws_lambda_events`. The provider runtime loop (polling,
//! retries, cold start) belongs to the host, not to this crate.

pub mod aws;
pub mod azure;
pub mod generic;

use std::convert::Infallible;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Value};
use thiserror::Error;
use tower::ServiceExt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Provider {
    Aws,
    Azure,
    GCloud,
    #[default]
    Generic,
}

impl Provider {
    /// Unknown or absent names fall back to the generic HTTP event adapter.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("aws" | "lambda") => Self::Aws,
            Some("azure") => Self::Azure,
            Some("gcloud" | "gcp" | "google") => Self::GCloud,
            _ => Self::Generic,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerlessError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("event payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("failed to build request: {0}")]
    Request(#[from] axum::http::Error),
    #[error("failed to read response body: {0}")]
    Body(#[from] axum::Error),
}

/// The composed application bound to one provider's invocation contract.
#[derive(Clone)]
pub struct ServerlessHandler {
    provider: Provider,
    router: Router,
}

impl ServerlessHandler {
    pub fn new(provider: Provider, router: Router) -> Self {
        Self { provider, router }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Handle one JSON invocation (`event` + provider `context`).
    pub async fn invoke(&self, mut event: Value, context: Value) -> Result<Value, ServerlessError> {
        let (request, shape) = match self.provider {
            Provider::Aws => {
                let (request, version) = aws::request(&mut event, &context)?;
                (request, Shape::Aws(version))
            }
            Provider::Azure => (azure::request(&event)?, Shape::Azure),
            Provider::GCloud | Provider::Generic => (generic::request(&event)?, Shape::Generic),
        };

        tracing::trace!(
            provider = ?self.provider,
            method = %request.method(),
            uri = %request.uri(),
            event = %event,
            context = %context,
            "serverless request"
        );

        let response = self.call(request).await;
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await?;
        let reply = ReplyParts {
            status: parts.status.as_u16(),
            headers: parts.headers,
            body: bytes,
        };

        let out = match shape {
            Shape::Aws(version) => aws::response(version, reply)?,
            Shape::Azure => azure::response(reply),
            Shape::Generic => generic::response(reply),
        };

        tracing::trace!(provider = ?self.provider, response = %out, "serverless response");
        Ok(out)
    }

    /// Plain HTTP passthrough (Cloud Functions / Cloud Run deliver real requests).
    pub async fn call(&self, request: Request) -> Response {
        let result: Result<Response, Infallible> = self.router.clone().oneshot(request).await;
        match result {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// Response encoding picked from the decoded event.
#[derive(Debug, Clone, Copy)]
enum Shape {
    Aws(aws::Version),
    Azure,
    Generic,
}

/// Response pieces handed to the provider encoders.
pub(crate) struct ReplyParts {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Provider-neutral request description.
#[derive(Debug, Default)]
pub(crate) struct EventRequest {
    pub method: String,
    pub path: String,
    /// Decoded pairs, used when the event carries no raw query string.
    pub query: Vec<(String, String)>,
    pub raw_query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl EventRequest {
    pub fn into_request(self) -> Result<Request, ServerlessError> {
        let method = if self.method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
                .map_err(|_| ServerlessError::InvalidEvent(format!("method `{}`", self.method)))?
        };

        let mut uri = if self.path.starts_with('/') {
            self.path
        } else {
            format!("/{}", self.path)
        };

        let query = match self.raw_query.filter(|q| !q.is_empty()) {
            Some(raw) => Some(raw),
            None if self.query.is_empty() => None,
            None => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in &self.query {
                    serializer.append_pair(key, value);
                }
                Some(serializer.finish())
            }
        };
        if let Some(query) = query {
            uri.push('?');
            uri.push_str(&query);
        }

        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ServerlessError::InvalidEvent(format!("header name `{name}`")))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|_| ServerlessError::InvalidEvent(format!("header value for `{name}`")))?;
            headers.append(name, value);
        }

        let mut request = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(self.body))?;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

/// `{name: value}` header object, names lower-cased.
pub(crate) fn read_headers(headers: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Object(headers)) = headers else {
        return Vec::new();
    };
    headers
        .iter()
        .filter_map(|(name, value)| scalar_string(value).map(|v| (name.to_ascii_lowercase(), v)))
        .collect()
}

/// Query pairs from a `{k: v}` / `{k: [v]}` object.
pub(crate) fn read_query(query: Option<&Value>) -> Vec<(String, String)> {
    let mut out = Vec::new();

    if let Some(Value::Object(query)) = query {
        for (key, value) in query {
            match value {
                Value::Array(values) => {
                    out.extend(values.iter().filter_map(scalar_string).map(|v| (key.clone(), v)))
                }
                other => {
                    if let Some(value) = scalar_string(other) {
                        out.push((key.clone(), value));
                    }
                }
            }
        }
    }

    out
}

/// Request body from a string (optionally base64) or an already parsed JSON value.
pub(crate) fn read_body(body: Option<&Value>, is_base64: bool) -> Result<Bytes, ServerlessError> {
    match body {
        None | Some(Value::Null) => Ok(Bytes::new()),
        Some(Value::String(s)) if is_base64 => STANDARD
            .decode(s)
            .map(Bytes::from)
            .map_err(|_| ServerlessError::InvalidEvent("body is not valid base64".to_string())),
        Some(Value::String(s)) => Ok(Bytes::from(s.clone())),
        Some(other) => Ok(Bytes::from(other.to_string())),
    }
}

/// Response body as the provider expects it: UTF-8 text, or base64 for binary.
pub(crate) fn write_body(headers: &HeaderMap, body: &Bytes) -> (String, bool) {
    let textual = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_none_or(is_textual);

    if textual {
        if let Ok(text) = std::str::from_utf8(body) {
            return (text.to_owned(), false);
        }
    }
    (STANDARD.encode(body), true)
}

/// `{name: value}`, values of repeated headers joined with `,`.
pub(crate) fn write_headers(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .keys()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            (name.as_str().to_owned(), Value::String(joined))
        })
        .collect()
}

fn is_textual(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence.starts_with("text/")
        || essence.ends_with("json")
        || essence.ends_with("xml")
        || essence.ends_with("javascript")
        || essence == "application/x-www-form-urlencoded"
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
