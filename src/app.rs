/*
 * Responsibility
 * - Compose the fixed pipeline around the user's routes:
 *   logging → error translation → CORS → body parsing → healthz → docs → routes
 * - Start / stop an HTTP listener (axum::serve + graceful shutdown)
 * - Hand the composed service to serverless adapters
 */
use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use tokio::{sync::oneshot, task::JoinHandle};

use crate::config::Config;
use crate::middleware::{self, body::BodyOptions, cors::CorsOptions};
use crate::router::{RouteInfo, Router};
use crate::routes::{
    docs::{self, SwaggerConfig},
    healthz::{self, HealthzOptions},
};
use crate::serverless::{Provider, ServerlessHandler};

pub struct AppOptions<S> {
    /// Used as the docs page title and in startup logs.
    pub name: String,
    pub cors: CorsOptions,
    pub body: BodyOptions,
    pub healthz: HealthzOptions<S>,
    /// `None` leaves `/docs` and `/docs/spec` uninstalled.
    pub docs: Option<SwaggerConfig>,
}

impl<S> AppOptions<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cors: CorsOptions::default(),
            body: BodyOptions::default(),
            healthz: HealthzOptions::default(),
            docs: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.name.clone(),
            cors: config.cors_options(),
            body: config.body_options(),
            healthz: HealthzOptions::default().endpoint(config.healthz_endpoint.clone()),
            docs: None,
        }
    }
}

struct ServerHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

/// Long-lived composition root. `S` is the service registry handed to handlers
/// as axum state.
pub struct Application<S> {
    name: String,
    services: S,
    cors: CorsOptions,
    body: BodyOptions,
    builtin: axum::Router<S>,
    routes: axum::Router<S>,
    route_infos: Vec<RouteInfo>,
    server: Option<ServerHandle>,
}

impl<S> Application<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(options: AppOptions<S>, services: S) -> Self {
        let mut builtin = healthz::router(options.healthz);
        if let Some(mut config) = options.docs {
            if config.title.is_empty() {
                config.title = options.name.clone();
            }
            builtin = builtin.merge(docs::router(config));
        }

        let route_infos = builtin.routes().to_vec();

        Self {
            name: options.name,
            services,
            cors: options.cors,
            body: options.body,
            builtin: builtin.attach(),
            routes: axum::Router::new(),
            route_infos,
            server: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn services(&self) -> &S {
        &self.services
    }

    /// Every named route, built-in ones included.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.route_infos
    }

    pub fn merge(mut self, router: Router<S>) -> Self {
        self.route_infos.extend(router.routes().iter().cloned());
        self.routes = self.routes.merge(router.attach());
        self
    }

    /// Mount `router` under `prefix` (`/api/v1`).
    pub fn nest(mut self, prefix: &str, router: Router<S>) -> Self {
        self.route_infos.extend(router.routes().iter().map(|route| RouteInfo {
            name: route.name.clone(),
            method: route.method.clone(),
            path: format!("{}{}", prefix.trim_end_matches('/'), route.path),
        }));
        self.routes = self.routes.nest(prefix, router.attach());
        self
    }

    /// The composed service with the full middleware pipeline.
    pub fn router(&self) -> axum::Router {
        let inner = self.builtin.clone().merge(self.routes.clone());

        let router = middleware::body::apply(inner, self.body.clone());
        let router = middleware::cors::apply(router, &self.cors);
        let router = middleware::error::apply(router);
        let router = middleware::logger::apply(router);

        router.with_state(self.services.clone())
    }

    /// Bind `0.0.0.0:port` (0 picks a free port) and serve in the background.
    pub async fn start(&mut self, port: u16) -> io::Result<SocketAddr> {
        if let Some(server) = &self.server {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("{} is already listening on {}", self.name, server.addr),
            ));
        }

        let listener = tokio::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    signal.await.ok();
                })
                .await
        });

        tracing::info!(name = %self.name, %addr, "listening");

        self.server = Some(ServerHandle { addr, shutdown, task });
        Ok(addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(|server| server.addr)
    }

    /// Stop accepting connections and wait for in-flight requests.
    ///
    /// Shutdown failures are logged as fatal, not returned. No-op when the
    /// server was never started.
    pub async fn stop(&mut self) {
        let Some(server) = self.server.take() else {
            tracing::debug!(name = %self.name, "stop called without a running server");
            return;
        };

        if server.shutdown.send(()).is_err() {
            tracing::debug!(name = %self.name, "server already finished");
        }

        match server.task.await {
            Ok(Ok(())) => tracing::info!(name = %self.name, addr = %server.addr, "server stopped"),
            Ok(Err(err)) => tracing::error!(fatal = true, error = %err, "server shutdown failed"),
            Err(err) => tracing::error!(fatal = true, error = %err, "server task failed"),
        }
    }

    /// Adapt the composed service to a serverless invocation contract.
    pub fn serverless(&self, provider: Provider) -> ServerlessHandler {
        ServerlessHandler::new(provider, self.router())
    }
}
