//! Request schema validation.
//!
//! Responsibility:
//! - Compile the declared fragments (query / path / body / headers / files) once
//! - Validate each declared fragment independently per request
//! - Reject with 400 "Bad Request" on the first mismatch; the details only go to
//!   the debug log
//!
//! Runs as a route layer so matched path params are available.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::{self, Next},
    response::Response,
};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::middleware::body::{ParsedBody, collect_pairs};
use crate::router::Router;
use crate::services::schema::{Schema, SchemaError};

/// JSON schema per request fragment. `None` skips the fragment.
#[derive(Debug, Clone, Default)]
pub struct RequestSchema {
    pub query: Option<Value>,
    pub path: Option<Value>,
    pub body: Option<Value>,
    pub headers: Option<Value>,
    pub files: Option<Value>,
}

#[derive(Debug, Clone, Copy)]
pub struct SchemaOptions {
    /// Unknown keywords / formats fail compilation.
    pub strict: bool,
    /// Coerce string sources (query, path, headers) to the declared scalar types.
    pub coerce_types: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            strict: false,
            coerce_types: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fragment {
    Query,
    Path,
    Body,
    Headers,
    Files,
}

#[derive(Debug, Clone)]
pub struct SchemaValidator {
    fragments: Vec<(Fragment, Schema)>,
    coerce_types: bool,
}

impl SchemaValidator {
    pub fn new(schema: RequestSchema, options: SchemaOptions) -> Result<Self, SchemaError> {
        let declared = [
            (Fragment::Query, schema.query),
            (Fragment::Path, schema.path),
            (Fragment::Body, schema.body),
            (Fragment::Headers, schema.headers),
            (Fragment::Files, schema.files),
        ];

        let mut fragments = Vec::new();
        for (fragment, definition) in declared {
            if let Some(definition) = definition {
                fragments.push((fragment, Schema::compile(&definition, options.strict)?));
            }
        }

        Ok(Self {
            fragments,
            coerce_types: options.coerce_types,
        })
    }

    /// Wrap every route registered on `router` so far.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(middleware::from_fn_with_state(Arc::new(self), validate))
    }

    async fn check(&self, parts: &mut Parts) -> Result<(), AppError> {
        for (fragment, schema) in &self.fragments {
            let value = match fragment {
                Fragment::Query => query_value(parts.uri.query()),
                Fragment::Path => path_value(parts).await,
                Fragment::Headers => headers_value(&parts.headers),
                Fragment::Body => parts
                    .extensions
                    .get::<ParsedBody>()
                    .map(|body| body.data.clone())
                    .unwrap_or_else(|| Value::Object(Map::new())),
                Fragment::Files => parts
                    .extensions
                    .get::<ParsedBody>()
                    .map(ParsedBody::files_as_json)
                    .unwrap_or_else(|| Value::Object(Map::new())),
            };

            let from_strings = matches!(fragment, Fragment::Query | Fragment::Path | Fragment::Headers);
            let value = if self.coerce_types && from_strings {
                schema.coerce(value)
            } else {
                value
            };

            if let Err(violation) = schema.validate(&value) {
                tracing::debug!(
                    fragment = ?fragment,
                    path = %violation.path,
                    reason = %violation.reason,
                    "request failed schema validation"
                );
                return Err(AppError::bad_request("Bad Request"));
            }
        }
        Ok(())
    }
}

async fn validate(
    State(validator): State<Arc<SchemaValidator>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    validator.check(&mut parts).await?;
    Ok(next.run(Request::from_parts(parts, body)).await)
}

fn query_value(query: Option<&str>) -> Value {
    let pairs = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes());
    Value::Object(collect_pairs(pairs))
}

async fn path_value(parts: &mut Parts) -> Value {
    let params = RawPathParams::from_request_parts(parts, &()).await.ok();
    let map = params
        .iter()
        .flat_map(|params| params.iter())
        .map(|(key, value)| (key.to_owned(), Value::String(value.to_owned())))
        .collect();
    Value::Object(map)
}

fn headers_value(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        map.insert(name.as_str().to_owned(), Value::String(joined));
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, header};
    use serde_json::json;

    use super::*;

    #[test]
    fn query_values_keep_repeated_keys() {
        assert_eq!(query_value(Some("a=1&b=x&a=2")), json!({ "a": ["1", "2"], "b": "x" }));
        assert_eq!(query_value(None), json!({}));
    }

    #[test]
    fn header_values_are_joined_strings() {
        let mut headers = HeaderMap::new();
        headers.append(header::ACCEPT, HeaderValue::from_static("text/html"));
        headers.append(header::ACCEPT, HeaderValue::from_static("application/json"));
        assert_eq!(headers_value(&headers), json!({ "accept": "text/html, application/json" }));
    }

    #[test]
    fn invalid_fragment_schema_is_reported_at_construction() {
        let schema = RequestSchema {
            body: Some(json!({ "type": "thing" })),
            ..RequestSchema::default()
        };
        assert!(SchemaValidator::new(schema, SchemaOptions::default()).is_err());
    }
}
