//! Cookie header parsing.
//!
//! Values are percent-decoded and surrounding quotes are removed. A value
//! of the form `j:<json>` is parsed as JSON and kept as a string when it
//! does not parse. The first occurrence of a name wins.

use axum::extract::Request;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{Map, Value};

/// Parsed cookies, attached to the request as an extension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cookies(pub Map<String, Value>);

/// Parse every `Cookie` header of a request.
pub fn parse_headers(headers: &HeaderMap) -> Map<String, Value> {
    let mut cookies = Map::new();
    for value in headers.get_all(header::COOKIE) {
        if let Ok(raw) = value.to_str() {
            parse_into(raw, &mut cookies);
        }
    }
    cookies
}

/// Parse one `Cookie` header value.
pub fn parse(raw: &str) -> Map<String, Value> {
    let mut cookies = Map::new();
    parse_into(raw, &mut cookies);
    cookies
}

fn parse_into(raw: &str, cookies: &mut Map<String, Value>) {
    for pair in raw.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || cookies.contains_key(name) {
            continue;
        }
        let mut value = value.trim();
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }
        let decoded = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        cookies.insert(name.to_string(), json_cookie(decoded));
    }
}

fn json_cookie(value: String) -> Value {
    match value.strip_prefix("j:") {
        Some(json) => serde_json::from_str(json).unwrap_or(Value::String(value)),
        None => Value::String(value),
    }
}

pub async fn stage(mut req: Request, next: Next) -> Response {
    if req.extensions().get::<Cookies>().is_none() {
        let cookies = Cookies(parse_headers(req.headers()));
        req.extensions_mut().insert(cookies);
    }
    next.run(req).await
}
