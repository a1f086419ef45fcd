use axum::http::{header, HeaderValue, Method};
use std::env;
use tower_http::cors::{AllowOrigin, CorsLayer};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

/// Browser clients send the session cookie cross-origin, so credentials are
/// allowed and origins must be an explicit list in production.
pub fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

fn allowed_origins() -> AllowOrigin {
    let raw = env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string());

    let origins: Vec<HeaderValue> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("CORS: invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS: no valid origins configured, falling back to the default");
        AllowOrigin::exact(
            DEFAULT_ALLOWED_ORIGINS
                .parse()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000")),
        )
    } else {
        tracing::info!("CORS: configured with {} allowed origin(s)", origins.len());
        AllowOrigin::list(origins)
    }
}
