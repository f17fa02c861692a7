//! Terminal error stage.
//!
//! Stages that fail return [`failure_response`] instead of calling the next
//! stage. The error stage wraps the whole chain, reports the failure on the
//! node's warning channel and turns it into a plain 500. Headers already on
//! the response (CORS, for instance) are kept.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::body::RequestError;
use crate::http::chain::RouteContext;
use crate::observability::metrics;
use crate::runtime::i18n::REQUEST_FAILED;

const FAILURE_BODY: &str = "Internal Server Error";

/// Marks a response produced by a failed stage.
#[derive(Debug, Clone)]
pub struct StageFailure(pub Arc<RequestError>);

/// Short-circuit response for a stage that could not continue.
pub fn failure_response(error: RequestError) -> Response {
    let mut response = Response::new(Body::from(FAILURE_BODY));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .extensions_mut()
        .insert(StageFailure(Arc::new(error)));
    response
}

pub async fn stage(State(route): State<Arc<RouteContext>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let Some(StageFailure(error)) = response.extensions().get::<StageFailure>().cloned() else {
        return response;
    };

    let message = error.to_string();
    tracing::warn!(kind = error.kind(), error = %message, path = %route.config.url, "Request failed");
    route.host.warn(REQUEST_FAILED, &[("error", message.as_str())]);
    metrics::record_failure(error.kind());

    let (mut parts, _) = response.into_parts();
    parts.status = StatusCode::INTERNAL_SERVER_ERROR;
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(FAILURE_BODY))
}
