//! Cross-cutting request stages. Each module exposes an `apply` that wraps a
//! router; `Application` applies the global ones in a fixed order.

pub mod auth;
pub mod body;
pub mod cors;
pub mod error;
pub mod logger;
pub mod schema;
