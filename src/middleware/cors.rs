//! CORS policy for browser clients.
//!
//! One policy for every route, installed by `Application` just inside error
//! translation. Preflights are answered here and never reach the router.
//!
//! Policy:
//! - No allowlist: any origin (`Allow-Origin: *`), or the request origin mirrored
//!   back when credentials are allowed.
//! - Allowlist: exact origin match; unknown origins get no CORS headers.
//! - Request headers are mirrored unless an explicit list is given.
//! - `x-correlation-id` is always exposed to scripts.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer, ExposeHeaders};

use crate::middleware::logger::CORRELATION_ID_HEADER;

#[derive(Debug, Clone)]
pub struct CorsOptions {
    /// Exact origins (`https://app.example.com`). Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
    pub allow_methods: Vec<Method>,
    /// Empty mirrors `Access-Control-Request-Headers`.
    pub allow_headers: Vec<HeaderName>,
    pub expose_headers: Vec<HeaderName>,
    pub max_age: Option<Duration>,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: false,
            allow_methods: vec![
                Method::GET,
                Method::HEAD,
                Method::PUT,
                Method::POST,
                Method::DELETE,
                Method::PATCH,
            ],
            allow_headers: Vec::new(),
            expose_headers: Vec::new(),
            max_age: None,
        }
    }
}

impl CorsOptions {
    /// Build the tower-http layer.
    ///
    /// Never combines a wildcard with `allow_credentials(true)` (tower-http rejects it).
    pub fn layer(&self) -> CorsLayer {
        let allow_origin = if self.allowed_origins.is_empty() {
            if self.allow_credentials {
                AllowOrigin::mirror_request()
            } else {
                AllowOrigin::from(Any)
            }
        } else {
            let allowed: Vec<HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|s| HeaderValue::from_str(s).ok())
                .collect();
            AllowOrigin::predicate(move |origin: &HeaderValue, _req| allowed.iter().any(|v| v == origin))
        };

        let allow_headers = if self.allow_headers.is_empty() {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::list(self.allow_headers.clone())
        };

        let mut expose = self.expose_headers.clone();
        let correlation = HeaderName::from_static(CORRELATION_ID_HEADER);
        if !expose.contains(&correlation) {
            expose.push(correlation);
        }

        let mut cors = CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(self.allow_methods.clone())
            .allow_headers(allow_headers)
            .expose_headers(ExposeHeaders::list(expose))
            .allow_credentials(self.allow_credentials);

        if let Some(max_age) = self.max_age {
            cors = cors.max_age(max_age);
        }

        cors
    }
}

/// Apply the CORS policy to the given Router.
pub fn apply<S>(router: Router<S>, options: &CorsOptions) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(options.layer())
}
