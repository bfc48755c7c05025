/*
 * Responsibility
 * - bearer token authentication: header parsing, structural decode,
 *   key resolution (static / JWKS) and verification
 * - the fixed failure messages returned to clients
 */
pub mod jwks;
pub mod token;

use thiserror::Error;

use crate::error::AppError;

pub use jwks::{JwksClient, KeyResolutionError};
pub use token::TokenVerifier;

#[derive(Debug, Clone, Default)]
pub struct AuthenticationOptions {
    /// Key set endpoint; `http://localhost/.well-known/` when unset.
    pub jwks_uri: Option<String>,
    /// Cache keys fetched from `jwks_uri`.
    pub cache: bool,
    /// Static verification key (PEM, or the shared secret for HS* tokens).
    /// Takes precedence over `jwks_uri`.
    pub public_key: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_seconds: u64,
}

/// Authentication failures. The Display text is what the client receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("Unauthorized")]
    MissingHeader,
    #[error("Invalid authorization header")]
    InvalidHeader,
    #[error("No authorization token provided")]
    MissingToken,
    #[error("Invalid token provided")]
    InvalidToken,
    #[error("Could not retrieve signing key")]
    SigningKey,
    #[error("Unauthorized")]
    Verification,
}

impl From<AuthenticationError> for AppError {
    fn from(e: AuthenticationError) -> Self {
        AppError::unauthorized(e.to_string())
    }
}
