//! URL-encoded form stage and the shared query-string decoder.
//!
//! Keys follow the extended form syntax: repeated keys collect into arrays,
//! `a[b]=c` nests into objects and `a[]=c` appends to an array.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::{Map, Value};

use crate::http::body::{
    content_length, has_body, media_type, read_body, BodyLimits, ParseError, ParsedBody, Payload,
    RequestError,
};
use crate::http::chain::RouteContext;
use crate::http::middleware::error::failure_response;

/// Maximum number of key/value pairs accepted in a form body.
pub const PARAMETER_LIMIT: usize = 1000;

fn is_form(req: &Request) -> bool {
    media_type(req.headers()).is_some_and(|m| {
        m.type_() == mime::APPLICATION && m.subtype() == mime::WWW_FORM_URLENCODED
    })
}

/// Split `a[b][]` into `("a", ["b", ""])`. Malformed keys stay whole.
fn split_key(key: &str) -> (&str, Vec<&str>) {
    let Some(open) = key.find('[') else {
        return (key, Vec::new());
    };
    if open == 0 {
        return (key, Vec::new());
    }

    let (root, mut rest) = key.split_at(open);
    let mut segments = Vec::new();
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return (key, Vec::new());
        };
        segments.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return (key, Vec::new());
    }
    (root, segments)
}

fn insert_leaf(target: &mut Map<String, Value>, key: &str, value: String) {
    match target.get_mut(key) {
        None => {
            target.insert(key.to_string(), Value::String(value));
        }
        Some(Value::Array(items)) => items.push(Value::String(value)),
        Some(existing) => {
            let previous = existing.take();
            *existing = Value::Array(vec![previous, Value::String(value)]);
        }
    }
}

fn insert_nested(target: &mut Map<String, Value>, key: &str, segments: &[&str], value: String) {
    let Some((first, rest)) = segments.split_first() else {
        insert_leaf(target, key, value);
        return;
    };

    let entry = target.entry(key.to_string()).or_insert_with(|| {
        if first.is_empty() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    });

    match entry {
        Value::Array(items) if first.is_empty() && rest.is_empty() => {
            items.push(Value::String(value));
        }
        Value::Object(child) => insert_nested(child, first, rest, value),
        // Conflicting shapes keep the first value.
        _ => {}
    }
}

/// Insert one decoded pair into a form object.
pub fn insert_pair(target: &mut Map<String, Value>, key: &str, value: String) {
    let (root, segments) = split_key(key);
    insert_nested(target, root, &segments, value);
}

/// Decode `application/x-www-form-urlencoded` data into an object.
pub fn parse_form(input: &[u8]) -> Result<Map<String, Value>, ParseError> {
    let mut form = Map::new();
    for (count, (key, value)) in url::form_urlencoded::parse(input).enumerate() {
        if count >= PARAMETER_LIMIT {
            return Err(ParseError::TooManyParameters {
                limit: PARAMETER_LIMIT,
            });
        }
        insert_pair(&mut form, &key, value.into_owned());
    }
    Ok(form)
}

/// Decode a query string; the same syntax as forms, without the limit.
pub fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let mut parsed = Map::new();
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            insert_pair(&mut parsed, &key, value.into_owned());
        }
    }
    parsed
}

/// Parse a form body in place, if the request carries one.
pub async fn parse_request(req: &mut Request, limits: &BodyLimits) -> Result<(), RequestError> {
    if req.extensions().get::<ParsedBody>().is_some() || !is_form(req) || !has_body(req.headers()) {
        return Ok(());
    }

    let declared = content_length(req.headers());
    let body = std::mem::take(req.body_mut());
    let bytes = read_body(body, declared, limits)
        .await
        .map_err(RequestError::from_parse_read)?;
    let form = parse_form(&bytes)?;

    req.extensions_mut()
        .insert(ParsedBody(Payload::Json(Value::Object(form))));
    Ok(())
}

pub async fn stage(State(route): State<Arc<RouteContext>>, mut req: Request, next: Next) -> Response {
    if let Err(e) = parse_request(&mut req, &route.limits).await {
        return failure_response(e);
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_and_repeated_keys() {
        let form = parse_form(b"a=1&b=two+words&a=3").unwrap();
        assert_eq!(Value::Object(form), json!({"a": ["1", "3"], "b": "two words"}));
    }

    #[test]
    fn nested_keys() {
        let form = parse_form(b"user[name]=ann&user[tags][]=x&user[tags][]=y").unwrap();
        assert_eq!(
            Value::Object(form),
            json!({"user": {"name": "ann", "tags": ["x", "y"]}})
        );
    }

    #[test]
    fn malformed_keys_stay_literal() {
        let form = parse_form(b"a[b=1&[c]=2&d[e]f=3").unwrap();
        assert_eq!(Value::Object(form), json!({"a[b": "1", "[c]": "2", "d[e]f": "3"}));
    }

    #[test]
    fn parameter_limit() {
        let body = (0..=PARAMETER_LIMIT)
            .map(|i| format!("k{i}=v"))
            .collect::<Vec<_>>()
            .join("&");
        assert!(matches!(
            parse_form(body.as_bytes()),
            Err(ParseError::TooManyParameters { .. })
        ));
    }

    #[test]
    fn query_strings() {
        assert_eq!(Value::Object(parse_query(Some("a=1"))), json!({"a": "1"}));
        assert!(parse_query(None).is_empty());
    }
}
