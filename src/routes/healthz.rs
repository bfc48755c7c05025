//! Health check route.
//!
//! 200 with an empty body, or with the JSON the optional check returns.
//! A failing check is an ordinary `AppError` (no implicit catch here).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::router::Router;

pub const DEFAULT_ENDPOINT: &str = "/healthz";

pub type HealthCheckFuture = Pin<Box<dyn Future<Output = AppResult<Option<Value>>> + Send>>;
pub type HealthCheck<S> = Arc<dyn Fn(S) -> HealthCheckFuture + Send + Sync>;

pub struct HealthzOptions<S> {
    pub endpoint: String,
    pub check: Option<HealthCheck<S>>,
}

impl<S> Clone for HealthzOptions<S> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            check: self.check.clone(),
        }
    }
}

impl<S> Default for HealthzOptions<S> {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            check: None,
        }
    }
}

impl<S> HealthzOptions<S> {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Run `check` with the service registry on every probe.
    pub fn check<F, Fut>(mut self, check: F) -> Self
    where
        S: 'static,
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Option<Value>>> + Send + 'static,
    {
        self.check = Some(Arc::new(move |services: S| -> HealthCheckFuture {
            Box::pin(check(services))
        }));
        self
    }
}

/// Route named `healthz` at the configured endpoint.
pub fn router<S>(options: HealthzOptions<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let check = options.check;

    Router::new().get(
        "healthz",
        &options.endpoint,
        move |State(services): State<S>| {
            let check = check.clone();
            async move { respond(services, check).await }
        },
    )
}

async fn respond<S>(services: S, check: Option<HealthCheck<S>>) -> Result<Response, AppError> {
    let Some(check) = check else {
        return Ok(StatusCode::OK.into_response());
    };

    match check(services).await? {
        Some(body) => Ok((StatusCode::OK, Json(body)).into_response()),
        None => Ok(StatusCode::OK.into_response()),
    }
}
