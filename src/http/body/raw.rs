//! Raw body stage: consumes whatever the typed parsers left behind.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::http::body::classify::{classify_headers, Verdict};
use crate::http::body::{content_length, read_body, BodyError, BodyLimits, ParsedBody, Payload};
use crate::http::chain::RouteContext;
use crate::http::middleware::error::failure_response;

/// Decode a received body according to its verdict.
pub fn decode_bytes(bytes: bytes::Bytes, verdict: Verdict) -> Payload {
    match verdict {
        Verdict::Text => Payload::Text(String::from_utf8_lossy(&bytes).into_owned()),
        Verdict::BinaryRaw => Payload::Binary(bytes),
        Verdict::BinaryCheckUtf8 => match std::str::from_utf8(&bytes) {
            Ok(text) => Payload::Text(text.to_string()),
            Err(_) => Payload::Binary(bytes),
        },
    }
}

/// Read and decode a body stream.
pub async fn decode(
    body: Body,
    declared: Option<u64>,
    verdict: Verdict,
    limits: &BodyLimits,
) -> Result<Payload, BodyError> {
    let bytes = read_body(body, declared, limits).await?;
    Ok(decode_bytes(bytes, verdict))
}

/// Decode the body of `req` in place and mark it consumed.
///
/// A request already marked consumed is left untouched; its body is not
/// polled.
pub async fn decode_request(req: &mut Request, limits: &BodyLimits) -> Result<(), BodyError> {
    if req.extensions().get::<ParsedBody>().is_some() {
        return Ok(());
    }

    let verdict = classify_headers(req.headers());
    let declared = content_length(req.headers());
    let body = std::mem::take(req.body_mut());
    let payload = decode(body, declared, verdict, limits).await?;

    tracing::trace!(?verdict, "Raw body decoded");
    req.extensions_mut().insert(ParsedBody(payload));
    Ok(())
}

pub async fn stage(State(route): State<Arc<RouteContext>>, mut req: Request, next: Next) -> Response {
    if let Err(e) = decode_request(&mut req, &route.raw_limits).await {
        return failure_response(e.into());
    }
    next.run(req).await
}
