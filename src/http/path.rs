//! Route path handling.
//!
//! Node paths use Express syntax: `:name` placeholders and a trailing `*`
//! wildcard. Axum wants `{name}` and `{*wildcard}`. Anything the router
//! cannot express is rejected here, before the router is built.
//! Parameter values are captured by matching the request path against the
//! configured pattern segment by segment.

use std::collections::HashSet;

use serde_json::{Map, Value};
use thiserror::Error;

/// Router name for a trailing `*`.
pub const WILDCARD: &str = "{*wildcard}";

/// A node path the router cannot serve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("placeholder without a name in segment '{0}'")]
    EmptyParam(String),

    #[error("invalid placeholder name '{0}'")]
    InvalidParam(String),

    #[error("placeholder '{0}' appears twice")]
    DuplicateParam(String),

    #[error("wildcard is only supported as the whole last segment, found '{0}'")]
    Wildcard(String),

    #[error("unsupported pattern syntax in segment '{0}'")]
    Unsupported(String),
}

fn is_param_name(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Convert `/users/:id/*` into the router pattern `/users/{id}/{*wildcard}`.
pub fn to_route_pattern(path: &str) -> Result<String, PathError> {
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    let mut seen = HashSet::new();

    let mut converted = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(PathError::EmptyParam(segment.to_string()));
            }
            if !is_param_name(name) {
                return Err(PathError::InvalidParam(name.to_string()));
            }
            if !seen.insert(name) {
                return Err(PathError::DuplicateParam(name.to_string()));
            }
            converted.push(format!("{{{name}}}"));
        } else if *segment == "*" && index == last {
            if seen.contains("wildcard") {
                return Err(PathError::DuplicateParam("wildcard".to_string()));
            }
            converted.push(WILDCARD.to_string());
        } else if segment.contains('*') {
            return Err(PathError::Wildcard(segment.to_string()));
        } else if segment.contains(['(', ')', '?', '+', ':']) {
            return Err(PathError::Unsupported(segment.to_string()));
        } else {
            converted.push(segment.replace('{', "{{").replace('}', "}}"));
        }
    }
    Ok(converted.join("/"))
}

/// Collect parameters from a request path matched by `pattern`.
///
/// `:name` segments are stored under their name; a trailing `*` stores the
/// rest of the path under `"0"`.
pub fn extract_params(pattern: &str, path: &str) -> Map<String, Value> {
    let mut params = Map::new();
    let actual: Vec<&str> = path.split('/').collect();
    for (index, expected) in pattern.split('/').enumerate() {
        if expected == "*" {
            let rest = actual.get(index..).map(|s| s.join("/")).unwrap_or_default();
            params.insert("0".to_string(), Value::String(decode(&rest)));
            break;
        }
        let Some(name) = expected.strip_prefix(':').filter(|n| !n.is_empty()) else {
            continue;
        };
        if let Some(value) = actual.get(index) {
            params.insert(name.to_string(), Value::String(decode(value)));
        }
    }
    params
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}
