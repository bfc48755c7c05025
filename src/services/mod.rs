pub mod auth;
pub mod schema;
