/*
 * Responsibility
 * - tracing subscriber initialisation (EnvFilter + fmt / json)
 * - panic hook that routes panics through tracing
 */
use std::{panic, str::FromStr};

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" | "fmt" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Map a bunyan/pino style level name onto a tracing directive.
///
/// `fatal` has no tracing equivalent and becomes `error`; `silent` turns logging off.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "fatal" => "error",
        "silent" | "off" => "off",
        _ => "info",
    }
}

/// Install the global subscriber.
///
/// RUST_LOG wins when set. Otherwise `level` applies to everything except
/// tower_http, which stays at info.
/// Calling it twice is harmless (the second install is ignored).
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},tower_http=info", level_directive(level)))
    });

    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init(),
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
}

/// Surface panics through tracing before the default hook prints them.
///
/// Request handler panics are turned into 500 responses by the error
/// middleware, so the process keeps serving.
pub fn init_panic_hook() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");
        default_hook(info);
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_logger_levels() {
        assert_eq!(level_directive("fatal"), "error");
        assert_eq!(level_directive("WARN"), "warn");
        assert_eq!(level_directive("silent"), "off");
        assert_eq!(level_directive("nonsense"), "info");
    }

    #[test]
    fn parses_log_format() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
