//! Body parsing.
//!
//! Responsibility:
//! - Buffer POST / PUT / PATCH bodies up to the configured limit
//! - Parse JSON, urlencoded forms, text and (opt-in) multipart into `ParsedBody`
//! - Put the buffered bytes back so handlers can still use `Json`, `Form`, `Bytes`
//!
//! Other content types are left untouched (still subject to the size limit).

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Multipart, Request, State},
    http::{Method, header, request::Parts},
    middleware::{self, Next},
    response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Value};
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct BodyOptions {
    /// Max body size in bytes.
    pub limit: usize,
    pub json: bool,
    pub form: bool,
    pub text: bool,
    /// Off by default: uploads are buffered in memory.
    pub multipart: bool,
}

impl BodyOptions {
    pub const DEFAULT_LIMIT: usize = 1024 * 1024;
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            limit: Self::DEFAULT_LIMIT,
            json: true,
            form: true,
            text: true,
            multipart: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Parsed request body, available as a request extension and extractor.
///
/// `data` is `{}` when nothing was parsed.
#[derive(Debug, Clone)]
pub struct ParsedBody {
    pub data: Value,
    pub files: Vec<UploadedFile>,
}

impl Default for ParsedBody {
    fn default() -> Self {
        Self {
            data: Value::Object(Map::new()),
            files: Vec::new(),
        }
    }
}

impl ParsedBody {
    /// Field name -> base64 content (array when a field carries several files).
    pub fn files_as_json(&self) -> Value {
        let mut out = Map::new();
        for file in &self.files {
            insert_repeated(&mut out, file.field.clone(), Value::String(STANDARD.encode(&file.bytes)));
        }
        Value::Object(out)
    }
}

impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<ParsedBody>().cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Text,
    Multipart,
}

pub fn apply<S>(router: Router<S>, options: BodyOptions) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let limit = options.limit;

    router
        .layer(DefaultBodyLimit::max(limit))
        .layer(RequestBodyLimitLayer::new(limit))
        .layer(middleware::from_fn_with_state(Arc::new(options), parse_body))
}

async fn parse_body(
    State(options): State<Arc<BodyOptions>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !matches!(*req.method(), Method::POST | Method::PUT | Method::PATCH) {
        return Ok(next.run(req).await);
    }

    let Some(kind) = body_kind(&req, &options) else {
        return Ok(next.run(req).await);
    };

    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > options.limit) {
        return Err(AppError::payload_too_large());
    }

    let (mut parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, options.limit).await.map_err(|err| {
        if is_length_limit(&err) {
            AppError::payload_too_large()
        } else {
            AppError::bad_request("Invalid request body")
        }
    })?;

    let parsed = match kind {
        BodyKind::Json => ParsedBody {
            data: parse_json(&bytes)?,
            files: Vec::new(),
        },
        BodyKind::Form => ParsedBody {
            data: Value::Object(collect_pairs(url::form_urlencoded::parse(&bytes))),
            files: Vec::new(),
        },
        BodyKind::Text => ParsedBody {
            data: Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            files: Vec::new(),
        },
        BodyKind::Multipart => parse_multipart(&parts, bytes.clone()).await?,
    };

    tracing::trace!(kind = ?kind, size = bytes.len(), "request body parsed");

    parts.extensions.insert(parsed);
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

fn body_kind(req: &Request, options: &BodyOptions) -> Option<BodyKind> {
    let content_type = req.headers().get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let kind = if essence == "application/json" || essence.ends_with("+json") {
        BodyKind::Json
    } else if essence == "application/x-www-form-urlencoded" {
        BodyKind::Form
    } else if essence == "multipart/form-data" {
        BodyKind::Multipart
    } else if essence.starts_with("text/") {
        BodyKind::Text
    } else {
        return None;
    };

    let enabled = match kind {
        BodyKind::Json => options.json,
        BodyKind::Form => options.form,
        BodyKind::Text => options.text,
        BodyKind::Multipart => options.multipart,
    };
    enabled.then_some(kind)
}

fn parse_json(bytes: &Bytes) -> Result<Value, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_slice(bytes).map_err(|err| {
        tracing::debug!(error = %err, "malformed json body");
        AppError::bad_request("Invalid request body")
    })
}

async fn parse_multipart(parts: &Parts, bytes: Bytes) -> Result<ParsedBody, AppError> {
    let mut probe = Request::new(Body::from(bytes));
    *probe.headers_mut() = parts.headers.clone();

    let invalid = |err: &dyn std::fmt::Display| {
        tracing::debug!(error = %err, "malformed multipart body");
        AppError::bad_request("Invalid request body")
    };

    let mut multipart = Multipart::from_request(probe, &())
        .await
        .map_err(|err| invalid(&err))?;

    let mut data = Map::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|err| invalid(&err))? {
        let name = field.name().unwrap_or_default().to_owned();
        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);

        if file_name.is_some() {
            let bytes = field.bytes().await.map_err(|err| invalid(&err))?;
            files.push(UploadedFile {
                field: name,
                file_name,
                content_type,
                bytes,
            });
        } else {
            let text = field.text().await.map_err(|err| invalid(&err))?;
            insert_repeated(&mut data, name, Value::String(text));
        }
    }

    Ok(ParsedBody {
        data: Value::Object(data),
        files,
    })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.to_string().contains("length limit exceeded") {
            return true;
        }
        source = e.source();
    }
    false
}

/// Collect decoded key/value pairs; repeated keys become arrays.
pub(crate) fn collect_pairs<K, V>(pairs: impl Iterator<Item = (K, V)>) -> Map<String, Value>
where
    K: Into<String>,
    V: Into<String>,
{
    let mut out = Map::new();
    for (key, value) in pairs {
        insert_repeated(&mut out, key.into(), Value::String(value.into()));
    }
    out
}

fn insert_repeated(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}
