//! Per-message response metrics.
//!
//! Timing starts when the request reaches this stage. Once the response
//! head is ready, and only if a message was emitted for it, the node reports
//! `response.time.millis` and `response.content-length.bytes` against the
//! message id.

use std::sync::Arc;
use std::time::Instant;

use axum::body::HttpBody;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use crate::http::chain::RouteContext;
use crate::observability::metrics;

pub const RESPONSE_TIME: &str = "response.time.millis";
pub const RESPONSE_LENGTH: &str = "response.content-length.bytes";

/// Message id of the request a response belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageId(pub String);

pub async fn stage(State(route): State<Arc<RouteContext>>, req: Request, next: Next) -> Response {
    if !route.metrics_enabled {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let started = Instant::now();
    let response = next.run(req).await;

    let Some(MessageId(msgid)) = response.extensions().get::<MessageId>() else {
        return response;
    };
    let elapsed = started.elapsed();
    let millis = (elapsed.as_secs_f64() * 1e6).round() / 1e3;
    route.host.metric(RESPONSE_TIME, msgid, millis);
    if let Some(length) = response_length(&response) {
        route.host.metric(RESPONSE_LENGTH, msgid, length as f64);
    }
    metrics::record_response(method.as_str(), response.status().as_u16(), elapsed);
    response
}

fn response_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| response.body().size_hint().exact())
}
