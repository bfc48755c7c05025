//! HTTP service scaffold on axum / tower.
//!
//! Standard middleware (correlation-id logging, error translation, CORS, body
//! parsing, JWT authentication and authorization, schema validation), health
//! check and docs routes, a named router, and an `Application` that composes
//! them and runs either as a server or behind a serverless adapter.

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod serverless;
pub mod services;
pub mod telemetry;

pub use app::{AppOptions, Application};
pub use error::{AppError, AppResult};
pub use router::Router;
