//! Bearer token authentication → `Principal` in request extensions.
//!
//! Flow (each failure is a 401 with a fixed message):
//! - principal already present → pass through
//! - `Authorization: Bearer <jwt>` parsing
//! - structural decode, `kid` required
//! - key resolution (static key or JWKS)
//! - signature + temporal claim verification

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::extractors::Principal;
use crate::router::Router;
use crate::services::auth::{AuthenticationError, TokenVerifier};

/// Require authentication on every route registered on `router` so far.
///
/// ```ignore
/// let verifier = Arc::new(TokenVerifier::new(&config.authentication_options()));
/// let orders = Router::new().get("list orders", "/orders", list_orders);
/// let orders = middleware::auth::authentication::apply(orders, verifier.clone());
/// ```
pub fn apply<S>(router: Router<S>, verifier: Arc<TokenVerifier>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(verifier, authenticate))
}

pub(crate) async fn authenticate(
    State(verifier): State<Arc<TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if req.extensions().get::<Principal>().is_some() {
        return Ok(next.run(req).await);
    }

    let authorization = match req.headers().get(header::AUTHORIZATION) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AuthenticationError::InvalidHeader)?
                .to_owned(),
        ),
        None => None,
    };

    let claims = verifier.authenticate(authorization.as_deref()).await?;

    req.extensions_mut().insert(Principal::from_claims(claims));

    Ok(next.run(req).await)
}
