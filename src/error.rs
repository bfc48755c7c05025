/*
 * Responsibility
 * - Common AppError (status / message / expose flag / optional details)
 * - IntoResponse: a plain fallback rendering + the error itself in response
 *   extensions, so the error translation middleware and the access log can see it
 * - JSON error envelope used by the translation middleware
 */
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Application level failure.
///
/// - `status` is always an error status; anything else is normalised to 500.
/// - `expose` decides whether the message (and details) reach the client.
///   It defaults to `status < 500`, the same rule http-errors style libraries use.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    status: StatusCode,
    message: String,
    expose: bool,
    details: Option<Value>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let status = if status.is_client_error() || status.is_server_error() {
            status
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        Self {
            status,
            message: message.into(),
            expose: status.is_client_error(),
            details: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{resource} not found."))
    }

    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn exposed(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_exposed(&self) -> bool {
        self.expose
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// `UNAUTHORIZED`, `BAD_REQUEST`, `INTERNAL_SERVER_ERROR`, ...
    pub fn code(&self) -> String {
        canonical_reason(self.status)
            .to_ascii_uppercase()
            .replace([' ', '-'], "_")
    }

    /// Message as the client is allowed to see it.
    pub fn public_message(&self) -> String {
        if self.expose {
            self.message.clone()
        } else {
            canonical_reason(self.status).to_string()
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.public_message(),
                details: if self.expose {
                    self.details.clone()
                } else {
                    None
                },
            },
        }
    }
}

pub(crate) fn canonical_reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown Error")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message()).into_response();
        response.extensions_mut().insert(self);
        response
    }
}
