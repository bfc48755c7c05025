//! API documentation routes.
//!
//! - `GET {route_prefix}`: Swagger UI page (assets from the swagger-ui-dist CDN)
//! - `GET {spec_prefix}`: the OpenAPI document as JSON

use std::sync::Arc;

use axum::{
    Json,
    response::{Html, IntoResponse},
};
use serde_json::{Map, Value, json};

use crate::router::Router;

const SWAGGER_UI_CDN: &str = "https://unpkg.com/swagger-ui-dist@5";

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub title: String,
    pub spec: Value,
    pub route_prefix: String,
    pub spec_prefix: String,
    pub hide_topbar: bool,
    /// Merged over the defaults handed to `SwaggerUIBundle`.
    pub swagger_options: Map<String, Value>,
}

impl SwaggerConfig {
    pub fn new(title: impl Into<String>, spec: Value) -> Self {
        Self {
            title: title.into(),
            spec,
            route_prefix: "/docs".to_string(),
            spec_prefix: "/docs/spec".to_string(),
            hide_topbar: true,
            swagger_options: Map::new(),
        }
    }

    /// Options passed to the UI bundle: defaults, then the user's overrides.
    pub fn ui_options(&self) -> Value {
        let mut options = Map::new();
        options.insert("url".into(), Value::String(self.spec_prefix.clone()));
        options.insert("dom_id".into(), Value::String("#swagger-ui".into()));
        options.insert("jsonEditor".into(), Value::Bool(true));
        options.insert("showRequestHeaders".into(), Value::Bool(true));
        options.insert("swaggerVersion".into(), Value::String("3.0.0".into()));
        for (key, value) in &self.swagger_options {
            options.insert(key.clone(), value.clone());
        }
        Value::Object(options)
    }
}

/// Default the definition the way doc generators expect (`components` present).
pub fn generate_spec(definition: Value) -> Value {
    match definition {
        Value::Object(mut object) => {
            object
                .entry("components")
                .or_insert_with(|| Value::Object(Map::new()));
            Value::Object(object)
        }
        Value::Null => json!({ "components": {} }),
        other => other,
    }
}

/// Routes `docs` and `docs spec`.
pub fn router<S>(config: SwaggerConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let page = Arc::new(render_page(&config));
    let spec = Arc::new(config.spec);

    Router::new()
        .get("docs", &config.route_prefix, move || {
            let page = Arc::clone(&page);
            async move { Html(page.as_str().to_owned()) }
        })
        .get("docs spec", &config.spec_prefix, move || {
            let spec = Arc::clone(&spec);
            async move { Json(spec.as_ref().clone()).into_response() }
        })
}

fn render_page(config: &SwaggerConfig) -> String {
    let options = escape_script(&config.ui_options().to_string());
    let title = escape_html(&config.title);
    let topbar = if config.hide_topbar {
        "<style>.swagger-ui .topbar { display: none; }</style>"
    } else {
        ""
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{title}</title>
  <link rel="stylesheet" href="{SWAGGER_UI_CDN}/swagger-ui.css" />
  {topbar}
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="{SWAGGER_UI_CDN}/swagger-ui-bundle.js" crossorigin></script>
  <script>
    window.onload = function () {{
      window.ui = SwaggerUIBundle({options});
    }};
  </script>
</body>
</html>
"#
    )
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn escape_script(json: &str) -> String {
    json.replace("</", "<\\/")
}
