/*
 * Responsibility
 * - authentication: bearer JWT → Principal
 * - authorization: required permission (+ optional AuthorizationService)
 */
pub mod authentication;
pub mod authorization;

pub use crate::services::auth::{AuthenticationOptions, TokenVerifier};
pub use authorization::{AuthorizationService, Requirement, require};
