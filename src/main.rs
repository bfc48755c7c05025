/*
 * Responsibility
 * - Config / tracing / panic hook
 * - Application with healthz (+ docs when DOCS_SPEC_PATH is set)
 * - Serve until ctrl-c, then shut down gracefully
 */
use std::fs;

use anyhow::{Context, Result};
use serde_json::Value;

use service_scaffold::{
    AppOptions, Application,
    config::Config,
    routes::docs::{self, SwaggerConfig},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;

    telemetry::init_tracing(&config.log_level, config.log_format);
    telemetry::init_panic_hook();

    tracing::info!("starting {} in {:?} mode on port {}", config.name, config.app_env, config.port);

    let mut options = AppOptions::from_config(&config);
    if let Some(path) = &config.docs_spec_path {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading docs spec {}", path.display()))?;
        let definition: Value = serde_json::from_str(&raw)
            .with_context(|| format!("parsing docs spec {}", path.display()))?;
        options.docs = Some(SwaggerConfig::new(config.name.clone(), docs::generate_spec(definition)));
    }

    let mut app = Application::new(options, ());
    app.start(config.port).await.context("binding listener")?;

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutdown requested");
    app.stop().await;

    Ok(())
}
