//! Permission check for an already authenticated principal.
//!
//! The required permission must be present in `principal.permissions`
//! (exact string match). When an `AuthorizationService` is attached, it gets the
//! final say as well.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::extractors::Principal;
use crate::router::Router;

/// Pluggable authorization decision (policy engine, tenant membership, ...).
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// `Ok(false)` rejects the request with 401; an error propagates as is.
    async fn is_authorised(&self, principal: &Principal, permission: &str) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct Requirement {
    permission: Arc<str>,
    service: Option<Arc<dyn AuthorizationService>>,
}

impl std::fmt::Debug for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requirement")
            .field("permission", &self.permission)
            .field("service", &self.service.is_some())
            .finish()
    }
}

pub fn require(permission: impl Into<String>) -> Requirement {
    Requirement {
        permission: Arc::from(permission.into()),
        service: None,
    }
}

impl Requirement {
    pub fn with_service(mut self, service: Arc<dyn AuthorizationService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }

    /// Enforce the requirement on every route registered on `router` so far.
    /// Must sit inside the authentication layer (apply authentication afterwards).
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.route_layer(middleware::from_fn_with_state(self, authorize))
    }
}

async fn authorize(
    State(requirement): State<Requirement>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .cloned()
        .ok_or_else(|| AppError::unauthorized("Unauthorized"))?;

    if !principal.has_permission(&requirement.permission) {
        tracing::warn!(
            permission = %requirement.permission,
            subject = principal.subject().unwrap_or_default(),
            "missing required permission"
        );
        return Err(AppError::unauthorized("Unauthorized"));
    }

    if let Some(service) = &requirement.service {
        let authorised = service
            .is_authorised(&principal, &requirement.permission)
            .await?;
        if !authorised {
            tracing::warn!(permission = %requirement.permission, "authorization service denied access");
            return Err(AppError::unauthorized("Unauthorized"));
        }
    }

    Ok(next.run(req).await)
}
