use jsonwebtoken::{Algorithm, AlgorithmFamily, DecodingKey, Header, Validation};
use serde_json::Value;
use tracing::warn;

use super::jwks::{DEFAULT_JWKS_URI, JwksClient};
use super::{AuthenticationError, AuthenticationOptions};

/// Extract the bearer credential from an `Authorization` header value.
///
/// The checks run in a fixed order and each failure has its own message:
/// - absent / empty header => `MissingHeader`
/// - empty scheme (e.g. leading space) => `InvalidHeader`
/// - missing or empty credential => `MissingToken`
/// - scheme other than `Bearer` => `InvalidHeader`
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthenticationError> {
    let header = header
        .filter(|h| !h.is_empty())
        .ok_or(AuthenticationError::MissingHeader)?;

    let mut parts = header.split(' ');

    let scheme = parts.next().unwrap_or_default();
    if scheme.is_empty() {
        return Err(AuthenticationError::InvalidHeader);
    }

    let token = parts
        .next()
        .filter(|t| !t.is_empty())
        .ok_or(AuthenticationError::MissingToken)?;

    if scheme != "Bearer" {
        return Err(AuthenticationError::InvalidHeader);
    }

    Ok(token)
}

/// A token whose structure has been decoded but whose signature has not been checked.
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    pub header: Header,
    pub kid: String,
}

pub fn inspect(token: &str) -> Result<UnverifiedToken, AuthenticationError> {
    let data = jsonwebtoken::dangerous::insecure_decode::<Value>(token)
        .map_err(|_| AuthenticationError::InvalidToken)?;

    let kid = data
        .header
        .kid
        .clone()
        .filter(|kid| !kid.is_empty())
        .ok_or(AuthenticationError::InvalidToken)?;

    Ok(UnverifiedToken {
        header: data.header,
        kid,
    })
}

enum KeySource {
    Static(String),
    Jwks(JwksClient),
}

/// Bearer token verifier: key resolution (static or JWKS) + signature/claim validation.
///
/// - Key material is intentionally not printable via Debug.
pub struct TokenVerifier {
    source: KeySource,
    issuer: Option<String>,
    audience: Option<String>,
    leeway_seconds: u64,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            KeySource::Static(_) => "static",
            KeySource::Jwks(client) => client.uri(),
        };
        f.debug_struct("TokenVerifier")
            .field("source", &source)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(options: &AuthenticationOptions) -> Self {
        let source = match &options.public_key {
            Some(key) => KeySource::Static(key.clone()),
            None => KeySource::Jwks(JwksClient::new(
                options
                    .jwks_uri
                    .clone()
                    .unwrap_or_else(|| DEFAULT_JWKS_URI.to_string()),
                options.cache,
            )),
        };

        Self {
            source,
            issuer: options.issuer.clone(),
            audience: options.audience.clone(),
            leeway_seconds: options.leeway_seconds,
        }
    }

    /// Run the full bearer flow and return the verified payload.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Value, AuthenticationError> {
        let token = parse_bearer(authorization)?;
        let unverified = inspect(token)?;
        let key = self.resolve_key(&unverified).await?;
        self.verify(token, unverified.header.alg, &key)
    }

    async fn resolve_key(&self, token: &UnverifiedToken) -> Result<DecodingKey, AuthenticationError> {
        match &self.source {
            KeySource::Static(material) => static_key(material, token.header.alg).map_err(|err| {
                warn!(error = %err, alg = ?token.header.alg, "static key does not fit token algorithm");
                AuthenticationError::Verification
            }),
            KeySource::Jwks(client) => client.signing_key(&token.kid).await.map_err(|err| {
                warn!(error = %err, kid = %token.kid, "could not retrieve signing key");
                AuthenticationError::SigningKey
            }),
        }
    }

    fn verify(&self, token: &str, alg: Algorithm, key: &DecodingKey) -> Result<Value, AuthenticationError> {
        jsonwebtoken::decode::<Value>(token, key, &self.validation(alg))
            .map(|data| data.claims)
            .map_err(|err| {
                warn!(error = %err, "token verification failed");
                AuthenticationError::Verification
            })
    }

    /// Signature + `exp`/`nbf` when present. No claim is mandatory; issuer and
    /// audience are only enforced when configured.
    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.required_spec_claims.clear();
        validation.leeway = self.leeway_seconds;
        validation.validate_nbf = true;

        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        validation
    }
}

/// Interpret configured key material according to the token's algorithm family.
fn static_key(material: &str, alg: Algorithm) -> jsonwebtoken::errors::Result<DecodingKey> {
    let material = material.as_bytes();
    let is = |family: AlgorithmFamily| family.algorithms().contains(&alg);

    if is(AlgorithmFamily::Hmac) {
        Ok(DecodingKey::from_secret(material))
    } else if is(AlgorithmFamily::Rsa) {
        DecodingKey::from_rsa_pem(material)
    } else if is(AlgorithmFamily::Ec) {
        DecodingKey::from_ec_pem(material)
    } else {
        DecodingKey::from_ed_pem(material)
    }
}
