//! Remote signing key resolution (JWKS) with optional in-memory caching.
//!
//! Keys are looked up by `kid`. When caching is enabled, resolved keys are kept
//! for `CACHE_MAX_AGE_SECS` and at most `CACHE_MAX_ENTRIES` keys are held; the
//! oldest entry is evicted first. No retries: a failed fetch fails the request.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::DecodingKey;
use jsonwebtoken::jwk::{JwkSet, PublicKeyUse};
use reqwest::Client;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

pub const DEFAULT_JWKS_URI: &str = "http://localhost/.well-known/";

const CACHE_MAX_AGE_SECS: i64 = 10 * 60 * 60;
const CACHE_MAX_ENTRIES: usize = 5;

#[derive(Debug, Error)]
pub enum KeyResolutionError {
    #[error("jwks request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("jwks endpoint answered {0}")]
    Status(reqwest::StatusCode),
    #[error("no signing key found for kid {0}")]
    UnknownKid(String),
    #[error("unusable signing key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

struct CachedKey {
    key: DecodingKey,
    expires_at: DateTime<Utc>,
}

pub struct JwksClient {
    uri: String,
    http: Client,
    cache: Option<RwLock<HashMap<String, CachedKey>>>,
}

impl std::fmt::Debug for JwksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksClient")
            .field("uri", &self.uri)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl JwksClient {
    pub fn new(uri: impl Into<String>, cache: bool) -> Self {
        Self {
            uri: uri.into(),
            http: Client::new(),
            cache: cache.then(|| RwLock::new(HashMap::new())),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub async fn signing_key(&self, kid: &str) -> Result<DecodingKey, KeyResolutionError> {
        if let Some(key) = self.cached(kid).await {
            debug!(kid = %kid, "using cached signing key");
            return Ok(key);
        }

        let keys = self.fetch().await?;

        let jwk = keys
            .keys
            .iter()
            .filter(|jwk| !matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)))
            .find(|jwk| jwk.common.key_id.as_deref() == Some(kid))
            .ok_or_else(|| KeyResolutionError::UnknownKid(kid.to_owned()))?;

        let key = DecodingKey::from_jwk(jwk)?;
        self.remember(kid, &key).await;

        Ok(key)
    }

    async fn fetch(&self) -> Result<JwkSet, KeyResolutionError> {
        debug!(uri = %self.uri, "fetching signing keys");

        let response = self.http.get(&self.uri).send().await?;
        if !response.status().is_success() {
            return Err(KeyResolutionError::Status(response.status()));
        }

        Ok(response.json::<JwkSet>().await?)
    }

    async fn cached(&self, kid: &str) -> Option<DecodingKey> {
        let cache = self.cache.as_ref()?.read().await;
        cache
            .get(kid)
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.key.clone())
    }

    async fn remember(&self, kid: &str, key: &DecodingKey) {
        let Some(cache) = &self.cache else {
            return;
        };

        let now = Utc::now();
        let mut cache = cache.write().await;
        cache.retain(|_, entry| entry.expires_at > now);

        if cache.len() >= CACHE_MAX_ENTRIES && !cache.contains_key(kid) {
            let oldest = cache
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(kid, _)| kid.clone());
            if let Some(oldest) = oldest {
                cache.remove(&oldest);
            }
        }

        cache.insert(
            kid.to_owned(),
            CachedKey {
                key: key.clone(),
                expires_at: now + Duration::seconds(CACHE_MAX_AGE_SECS),
            },
        );
    }

    #[cfg(test)]
    async fn cached_kids(&self) -> Vec<String> {
        match &self.cache {
            Some(cache) => {
                let mut kids: Vec<String> = cache.read().await.keys().cloned().collect();
                kids.sort();
                kids
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DecodingKey {
        DecodingKey::from_secret(b"not-used-for-verification")
    }

    #[tokio::test]
    async fn cache_is_off_unless_requested() {
        let client = JwksClient::new(DEFAULT_JWKS_URI, false);
        client.remember("kid-1", &key()).await;
        assert!(client.cached("kid-1").await.is_none());
    }

    #[tokio::test]
    async fn cache_keeps_at_most_five_keys() {
        let client = JwksClient::new(DEFAULT_JWKS_URI, true);
        for i in 0..7 {
            client.remember(&format!("kid-{i}"), &key()).await;
        }

        let kids = client.cached_kids().await;
        assert_eq!(kids.len(), CACHE_MAX_ENTRIES);
        assert!(client.cached("kid-6").await.is_some());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_fetch_error() {
        let client = JwksClient::new("http://127.0.0.1:9/.well-known/jwks.json", false);
        let err = client.signing_key("kid-1").await.unwrap_err();
        assert!(matches!(err, KeyResolutionError::Fetch(_)));
    }
}
