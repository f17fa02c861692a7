//! Whole-body text stage for raw-JSON routes.
//!
//! Reads every body as text whatever its declared type, so JSON arrives at
//! the flow unparsed. A request without a body yields an empty object.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::body::classify::Verdict;
use crate::http::body::raw::decode;
use crate::http::body::{content_length, has_body, BodyLimits, ParsedBody, Payload, RequestError};
use crate::http::chain::RouteContext;
use crate::http::middleware::error::failure_response;

pub async fn parse_request(req: &mut Request, limits: &BodyLimits) -> Result<(), RequestError> {
    if req.extensions().get::<ParsedBody>().is_some() {
        return Ok(());
    }
    if !has_body(req.headers()) {
        req.extensions_mut()
            .insert(ParsedBody(Payload::Json(serde_json::json!({}))));
        return Ok(());
    }
    let declared = content_length(req.headers());
    let body = std::mem::take(req.body_mut());
    let payload = decode(body, declared, Verdict::Text, limits)
        .await
        .map_err(RequestError::from_parse_read)?;
    req.extensions_mut().insert(ParsedBody(payload));
    Ok(())
}

pub async fn stage(State(route): State<Arc<RouteContext>>, mut req: Request, next: Next) -> Response {
    if let Err(e) = parse_request(&mut req, &route.text_limits).await {
        return failure_response(e);
    }
    next.run(req).await
}
