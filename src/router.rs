//! Named routes on top of axum's router.
//!
//! Every route carries a human readable name (used for introspection and docs)
//! independent of its path pattern. Methods registered on the same path share one
//! `MethodRouter`, so axum answers 405 (with `Allow`) for a known path and an
//! unknown method, and 404 for an unknown path.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::{
    extract::Request,
    handler::Handler,
    http::Method,
    response::IntoResponse,
    routing::{MethodFilter, MethodRouter, Route},
};
use tower::{Layer, Service};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub name: String,
    pub method: Method,
    pub path: String,
}

pub struct Router<S = ()> {
    paths: BTreeMap<String, MethodRouter<S>>,
    routes: Vec<RouteInfo>,
}

impl<S> Default for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            paths: BTreeMap::new(),
            routes: Vec::new(),
        }
    }

    /// Register `handler` for `method` + `path` under `name`.
    ///
    /// Panics on methods axum cannot route (extension methods) and on duplicate
    /// method/path pairs; both are startup wiring mistakes.
    pub fn on<H, T>(mut self, name: impl Into<String>, method: Method, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        let name = name.into();
        let filter = MethodFilter::try_from(method.clone())
            .unwrap_or_else(|_| panic!("unsupported method `{method}` for route `{name}`"));

        let endpoint = self
            .paths
            .remove(path)
            .unwrap_or_else(MethodRouter::new)
            .on(filter, handler);
        self.paths.insert(path.to_owned(), endpoint);

        self.routes.push(RouteInfo {
            name,
            method,
            path: path.to_owned(),
        });
        self
    }

    pub fn get<H, T>(self, name: impl Into<String>, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.on(name, Method::GET, path, handler)
    }

    pub fn post<H, T>(self, name: impl Into<String>, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.on(name, Method::POST, path, handler)
    }

    pub fn put<H, T>(self, name: impl Into<String>, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.on(name, Method::PUT, path, handler)
    }

    pub fn patch<H, T>(self, name: impl Into<String>, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.on(name, Method::PATCH, path, handler)
    }

    pub fn delete<H, T>(self, name: impl Into<String>, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.on(name, Method::DELETE, path, handler)
    }

    pub fn head<H, T>(self, name: impl Into<String>, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.on(name, Method::HEAD, path, handler)
    }

    pub fn options<H, T>(self, name: impl Into<String>, path: &str, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.on(name, Method::OPTIONS, path, handler)
    }

    /// Combine two routers. Panics when both bind the same method on the same path.
    pub fn merge(mut self, other: Router<S>) -> Self {
        for (path, endpoint) in other.paths {
            let merged = match self.paths.remove(&path) {
                Some(existing) => existing.merge(endpoint),
                None => endpoint,
            };
            self.paths.insert(path, merged);
        }
        self.routes.extend(other.routes);
        self
    }

    /// Wrap every route registered so far with `layer`.
    ///
    /// Runs only for matched method/path pairs (404 / 405 bypass it). Routes
    /// added afterwards are not wrapped.
    pub fn route_layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.paths = std::mem::take(&mut self.paths)
            .into_iter()
            .map(|(path, endpoint)| (path, endpoint.route_layer(layer.clone())))
            .collect();
        self
    }

    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    pub fn route(&self, name: &str) -> Option<&RouteInfo> {
        self.routes.iter().find(|route| route.name == name)
    }

    /// Compile into an axum router (route matching + method-not-allowed handling).
    pub fn attach(self) -> axum::Router<S> {
        self.paths
            .into_iter()
            .fold(axum::Router::new(), |router, (path, endpoint)| {
                router.route(&path, endpoint)
            })
    }
}
