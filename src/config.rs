/*
 * Responsibility
 * - Load environment variables / .env (name, port, log level, CORS, body, JWT, docs)
 * - Validate values (fail startup when something is unusable)
 * - Translate into the option structs the middleware factories take
 */
use std::fmt;
use std::path::PathBuf;

use crate::middleware::auth::AuthenticationOptions;
use crate::middleware::body::BodyOptions;
use crate::middleware::cors::CorsOptions;
use crate::telemetry::LogFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub app_env: AppEnv,
    pub port: u16,

    pub log_level: String,
    pub log_format: LogFormat,

    pub cors_allowed_origins: Vec<String>,
    pub cors_allow_credentials: bool,

    pub body_limit_bytes: usize,
    pub body_multipart: bool,

    pub healthz_endpoint: String,

    pub jwks_uri: Option<String>,
    pub jwks_cache: bool,
    pub jwt_public_key_pem: Option<String>,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub jwt_leeway_seconds: u64,

    pub docs_spec_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, with an injectable lookup (tests, embedding hosts).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let name = non_empty("APP_NAME")
            .or_else(|| non_empty("HOSTNAME"))
            .or_else(|| non_empty("USER"))
            .unwrap_or_else(|| "localhost".to_string());

        let app_env = lookup("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        let port = match non_empty("PORT") {
            Some(v) => v.parse::<u16>().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };

        let log_level = non_empty("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        // Production logs go to collectors, so they default to JSON lines.
        let log_format = match non_empty("LOG_FORMAT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid("LOG_FORMAT"))?,
            None if app_env.is_production() => LogFormat::Json,
            None => LogFormat::Pretty,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let cors_allow_credentials = parse_flag(&lookup, "CORS_ALLOW_CREDENTIALS")?.unwrap_or(false);

        let body_limit_bytes = match non_empty("BODY_LIMIT_BYTES") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid("BODY_LIMIT_BYTES"))?,
            None => BodyOptions::DEFAULT_LIMIT,
        };

        let body_multipart = parse_flag(&lookup, "BODY_MULTIPART")?.unwrap_or(false);

        let healthz_endpoint = non_empty("HEALTHZ_ENDPOINT").unwrap_or_else(|| "/healthz".to_string());
        if !healthz_endpoint.starts_with('/') {
            return Err(ConfigError::Invalid("HEALTHZ_ENDPOINT"));
        }

        let jwks_uri = non_empty("JWKS_URI");
        if let Some(uri) = &jwks_uri {
            url::Url::parse(uri).map_err(|_| ConfigError::Invalid("JWKS_URI"))?;
        }

        let jwks_cache = parse_flag(&lookup, "JWKS_CACHE")?.unwrap_or(false);

        let jwt_public_key_pem = non_empty("JWT_PUBLIC_KEY_PEM").map(|v| v.replace("\\n", "\n"));

        let jwt_issuer = non_empty("JWT_ISSUER");
        let jwt_audience = non_empty("JWT_AUDIENCE");

        let jwt_leeway_seconds = match non_empty("JWT_LEEWAY_SECONDS") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid("JWT_LEEWAY_SECONDS"))?,
            None => 0,
        };

        let docs_spec_path = non_empty("DOCS_SPEC_PATH").map(PathBuf::from);

        Ok(Self {
            name,
            app_env,
            port,
            log_level,
            log_format,
            cors_allowed_origins,
            cors_allow_credentials,
            body_limit_bytes,
            body_multipart,
            healthz_endpoint,
            jwks_uri,
            jwks_cache,
            jwt_public_key_pem,
            jwt_issuer,
            jwt_audience,
            jwt_leeway_seconds,
            docs_spec_path,
        })
    }

    pub fn cors_options(&self) -> CorsOptions {
        CorsOptions {
            allowed_origins: self.cors_allowed_origins.clone(),
            allow_credentials: self.cors_allow_credentials,
            ..CorsOptions::default()
        }
    }

    pub fn body_options(&self) -> BodyOptions {
        BodyOptions {
            limit: self.body_limit_bytes,
            multipart: self.body_multipart,
            ..BodyOptions::default()
        }
    }

    pub fn authentication_options(&self) -> AuthenticationOptions {
        AuthenticationOptions {
            jwks_uri: self.jwks_uri.clone(),
            cache: self.jwks_cache,
            public_key: self.jwt_public_key_pem.clone(),
            issuer: self.jwt_issuer.clone(),
            audience: self.jwt_audience.clone(),
            leeway_seconds: self.jwt_leeway_seconds,
        }
    }
}

fn parse_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<bool>, ConfigError> {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid(key)),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.name, "localhost");
        assert_eq!(config.port, 3000);
        assert_eq!(config.healthz_endpoint, "/healthz");
        assert_eq!(config.body_limit_bytes, 1024 * 1024);
        assert!(!config.jwks_cache);
        assert_eq!(config.jwt_leeway_seconds, 0);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.cors_allowed_origins.is_empty());
    }

    #[test]
    fn name_falls_back_to_hostname_then_user() {
        assert_eq!(config_from(&[("HOSTNAME", "box-1"), ("USER", "me")]).unwrap().name, "box-1");
        assert_eq!(config_from(&[("USER", "me")]).unwrap().name, "me");
        assert_eq!(config_from(&[("APP_NAME", "orders"), ("USER", "me")]).unwrap().name, "orders");
    }

    #[test]
    fn parses_lists_flags_and_keys() {
        let config = config_from(&[
            ("CORS_ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("JWKS_URI", "https://issuer.example/.well-known/jwks.json"),
            ("JWKS_CACHE", "true"),
            ("JWT_PUBLIC_KEY_PEM", "-----BEGIN PUBLIC KEY-----\\nabc\\n-----END PUBLIC KEY-----"),
            ("APP_ENV", "prod"),
        ])
        .unwrap();

        assert_eq!(config.cors_allowed_origins, vec!["https://a.example", "https://b.example"]);
        assert!(config.jwks_cache);
        assert!(config.app_env.is_production());
        assert!(config.jwt_public_key_pem.unwrap().contains("\nabc\n"));
    }

    #[test]
    fn production_defaults_to_json_logs() {
        let config = config_from(&[("APP_ENV", "production")]).unwrap();
        assert!(config.app_env.is_production());
        assert_eq!(config.log_format, LogFormat::Json);

        let config = config_from(&[("APP_ENV", "production"), ("LOG_FORMAT", "pretty")]).unwrap();
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_unusable_values() {
        assert!(matches!(config_from(&[("PORT", "http")]), Err(ConfigError::Invalid("PORT"))));
        assert!(matches!(
            config_from(&[("JWKS_URI", "not a url")]),
            Err(ConfigError::Invalid("JWKS_URI"))
        ));
        assert!(matches!(
            config_from(&[("JWKS_CACHE", "maybe")]),
            Err(ConfigError::Invalid("JWKS_CACHE"))
        ));
        assert!(matches!(
            config_from(&[("HEALTHZ_ENDPOINT", "healthz")]),
            Err(ConfigError::Invalid("HEALTHZ_ENDPOINT"))
        ));
    }
}
