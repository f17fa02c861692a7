//! JSON body stage.
//!
//! Only `application/json` bodies are parsed here; vendor `+json` types fall
//! through to the raw stage. Parsing is strict: the top-level value must be
//! an object or an array, and an empty body yields `{}`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::Value;

use crate::http::body::{
    content_length, has_body, media_type, read_body, BodyLimits, ParseError, ParsedBody, Payload,
    RequestError,
};
use crate::http::chain::RouteContext;
use crate::http::middleware::error::failure_response;

fn is_json(req: &Request) -> bool {
    media_type(req.headers()).is_some_and(|m| {
        m.type_() == mime::APPLICATION && m.subtype() == mime::JSON && m.suffix().is_none()
    })
}

/// Parse a strict JSON document.
pub fn parse_strict(bytes: &[u8]) -> Result<Value, ParseError> {
    let Some(first) = bytes.iter().find(|b| !b.is_ascii_whitespace()) else {
        return Ok(Value::Object(Default::default()));
    };
    if *first != b'{' && *first != b'[' {
        return Err(ParseError::NotObjectOrArray);
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Parse a JSON body in place, if the request carries one.
pub async fn parse_request(req: &mut Request, limits: &BodyLimits) -> Result<(), RequestError> {
    if req.extensions().get::<ParsedBody>().is_some() || !is_json(req) || !has_body(req.headers()) {
        return Ok(());
    }

    let declared = content_length(req.headers());
    let body = std::mem::take(req.body_mut());
    let bytes = read_body(body, declared, limits)
        .await
        .map_err(RequestError::from_parse_read)?;
    let value = parse_strict(&bytes)?;

    req.extensions_mut().insert(ParsedBody(Payload::Json(value)));
    Ok(())
}

pub async fn stage(State(route): State<Arc<RouteContext>>, mut req: Request, next: Next) -> Response {
    if let Err(e) = parse_request(&mut req, &route.limits).await {
        return failure_response(e);
    }
    next.run(req).await
}
