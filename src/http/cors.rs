//! CORS policy for the dedicated listener.
//!
//! Translates [`CorsConfig`] into a `tower_http` [`CorsLayer`]. Entries that
//! are not valid header values are skipped with a warning.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};

use crate::config::CorsConfig;

/// Build the CORS layer for a policy.
///
/// A wildcard origin with credentials enabled mirrors the request origin,
/// since browsers reject `*` on credentialed requests.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let wildcard = config.origin.iter().any(|o| o == "*");
    let allow_origin = match (wildcard, config.credentials) {
        (true, false) => AllowOrigin::from(Any),
        (true, true) => AllowOrigin::mirror_request(),
        (false, _) => AllowOrigin::list(parse_all::<HeaderValue>(&config.origin, "origin")),
    };

    let allow_headers = if config.allowed_headers.is_empty() {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(parse_all::<HeaderName>(&config.allowed_headers, "allowed header"))
    };

    let mut layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(parse_all::<Method>(&config.methods, "method"))
        .allow_headers(allow_headers)
        .expose_headers(parse_all::<HeaderName>(&config.exposed_headers, "exposed header"))
        .allow_credentials(config.credentials);
    if let Some(secs) = config.max_age_secs {
        layer = layer.max_age(Duration::from_secs(secs));
    }

    tracing::info!(
        origins = ?config.origin,
        credentials = config.credentials,
        "CORS policy configured"
    );
    layer
}

fn parse_all<T: std::str::FromStr>(values: &[String], what: &str) -> Vec<T> {
    values
        .iter()
        .filter_map(|value| match value.trim().parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                tracing::warn!(value = %value, "Ignoring invalid CORS {}", what);
                None
            }
        })
        .collect()
}

/// Answers `OPTIONS` requests the CORS layer did not treat as preflight.
pub async fn preflight_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}
