//! Correlation id of the current request, as assigned by the logging middleware.

use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tower_http::request_id::RequestId;

use crate::error::AppError;
use crate::middleware::logger::CORRELATION_ID_HEADER;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .extensions
            .get::<RequestId>()
            .map(RequestId::header_value)
            .or_else(|| parts.headers.get(CORRELATION_ID_HEADER))
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::internal("correlation id missing: logging middleware not applied"))?;

        Ok(Self(value.to_owned()))
    }
}
