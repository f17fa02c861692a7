//! Per-route middleware chain.
//!
//! # Responsibilities
//! - Decide which stages a route runs, in order ([`assemble`])
//! - Turn that order into Axum layers around the dispatcher
//! - Register the CORS preflight routes when a policy is configured
//!
//! # Design Decisions
//! - Stages are `from_fn` middleware sharing one [`RouteContext`]
//! - The error stage is always the outermost layer, so it sees failures
//!   from every other stage
//! - Raw-JSON routes skip cookies, host middleware, CORS and metrics

use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::{from_fn, from_fn_with_state, Next};
use axum::routing::{on, options, MethodRouter};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::config::validation::parse_byte_size;
use crate::config::{HostSettings, HttpMethod, NodeConfig};
use crate::http::body::{json, multipart, raw, text, urlencoded, BodyLimits, TEXT_BODY_MAX_BYTES};
use crate::http::cors::{cors_layer, preflight_handler};
use crate::http::dispatch::dispatch;
use crate::http::middleware::host::HttpNodeMiddleware;
use crate::http::middleware::{cookies, error, metrics};
use crate::http::path::{to_route_pattern, PathError, WILDCARD};
use crate::runtime::NodeHost;

/// State shared by every stage of one route.
pub struct RouteContext {
    /// Node configuration, with the path already normalised.
    pub config: NodeConfig,
    pub host: Arc<dyn NodeHost>,
    /// Bounds for the JSON, form and multipart stages.
    pub limits: BodyLimits,
    /// Bounds for the raw stage.
    pub raw_limits: BodyLimits,
    /// Bounds for the raw-JSON text stage.
    pub text_limits: BodyLimits,
    pub metrics_enabled: bool,
}

impl RouteContext {
    pub fn new(config: NodeConfig, settings: &HostSettings, host: Arc<dyn NodeHost>) -> Self {
        let read_timeout = settings.body_read_timeout();
        let bounded = |size: &str, fallback: usize| BodyLimits {
            max_bytes: parse_byte_size(size).unwrap_or_else(|e| {
                tracing::warn!(error = %e, fallback, "Invalid body size, using default");
                fallback
            }),
            read_timeout,
        };
        let raw_limits = match &settings.raw_body_max_size {
            Some(size) => bounded(size, usize::MAX),
            None => BodyLimits::unbounded(read_timeout),
        };
        Self {
            config,
            host,
            limits: bounded(&settings.max_body_size, BodyLimits::default().max_bytes),
            raw_limits,
            text_limits: bounded(&settings.text_body_max_size, TEXT_BODY_MAX_BYTES),
            metrics_enabled: settings.metrics_enabled,
        }
    }
}

/// One step of a route's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cookies,
    HostMiddleware,
    Cors,
    Metrics,
    JsonBody,
    UrlEncodedBody,
    Multipart,
    RawBody,
    TextBody,
    Dispatch,
    ErrorHandler,
}

/// Stages for a route, in request order.
pub fn assemble(config: &NodeConfig) -> Vec<Stage> {
    use Stage::*;

    let raw_capable = matches!(config.method, HttpMethod::Post | HttpMethod::Put);
    if config.raw_json && raw_capable {
        return vec![TextBody, Dispatch, ErrorHandler];
    }

    let mut stages = vec![Cookies, HostMiddleware, Cors, Metrics];
    if config.method.is_mutating() {
        stages.extend([JsonBody, UrlEncodedBody]);
        if config.upload && config.method == HttpMethod::Post {
            stages.push(Multipart);
        }
        stages.push(RawBody);
    }
    stages.extend([Dispatch, ErrorHandler]);
    stages
}

/// Build the router for one node: its route plus any preflight routes.
///
/// Fails, without panicking, when the node path has no router equivalent.
pub fn build_router(
    route: Arc<RouteContext>,
    settings: &HostSettings,
) -> Result<Router, PathError> {
    let pattern = to_route_pattern(&route.config.url)?;
    let cors = settings.cors.as_ref().map(cors_layer);
    let stages = assemble(&route.config);

    let mut chain: MethodRouter =
        on(route.config.method.filter(), dispatch).with_state(route.clone());
    for stage in stages.iter().rev() {
        chain = match stage {
            Stage::Cookies => chain.layer(from_fn(cookies::stage)),
            Stage::HostMiddleware => host_layers(chain, &settings.middleware),
            Stage::Cors => match &cors {
                Some(layer) => chain.layer(layer.clone()),
                None => chain,
            },
            Stage::Metrics => chain.layer(from_fn_with_state(route.clone(), metrics::stage)),
            Stage::JsonBody => chain.layer(from_fn_with_state(route.clone(), json::stage)),
            Stage::UrlEncodedBody => {
                chain.layer(from_fn_with_state(route.clone(), urlencoded::stage))
            }
            Stage::Multipart => chain.layer(from_fn_with_state(route.clone(), multipart::stage)),
            Stage::RawBody => chain.layer(from_fn_with_state(route.clone(), raw::stage)),
            Stage::TextBody => chain.layer(from_fn_with_state(route.clone(), text::stage)),
            Stage::Dispatch | Stage::ErrorHandler => chain,
        };
    }
    if stages.contains(&Stage::ErrorHandler) {
        chain = chain.layer(from_fn_with_state(route.clone(), error::stage));
    }

    let Some(cors) = cors else {
        return Ok(Router::new().route(&pattern, chain));
    };
    Ok(with_preflight(chain, &pattern, route.config.method, cors))
}

fn host_layers(mut chain: MethodRouter, middleware: &[HttpNodeMiddleware]) -> MethodRouter {
    for m in middleware.iter().rev().cloned() {
        chain = chain.layer(from_fn(move |req: Request, next: Next| m.call(req, next)));
    }
    chain
}

fn with_preflight(chain: MethodRouter, pattern: &str, method: HttpMethod, cors: CorsLayer) -> Router {
    let preflight: MethodRouter = options(preflight_handler).layer(cors);
    let node_route = if method == HttpMethod::Options {
        chain
    } else {
        preflight.clone().merge(chain)
    };

    let catch_all = format!("/{WILDCARD}");
    let mut router = Router::new().route(pattern, node_route);
    if pattern != catch_all {
        router = router.route(&catch_all, preflight.clone());
    }
    if pattern != "/" {
        router = router.route("/", preflight);
    }
    router
}
