//! Inbound request model and its facade.
//!
//! # Responsibilities
//! - Snapshot a request once the chain has parsed it ([`HttpRequest`])
//! - Offer the familiar accessors (`get`, `is`, `param`, `accepts_*`)
//! - Wrap it in an allow-listed [`RequestFacade`] that warns on every
//!   operation call
//!
//! # Design Decisions
//! - The snapshot is immutable and shared via `Arc` with the message
//! - Proxy headers are not trusted: `ip` is the peer address, `ips` is empty

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method};
use serde_json::{Map, Value};

use crate::http::body::urlencoded::parse_query;
use crate::http::body::{has_body, media_type, ParsedBody, Payload, UploadedFile, UploadedFiles};
use crate::http::middleware::cookies::Cookies;
use crate::runtime::i18n::DEPRECATED_CALL;
use crate::runtime::NodeHost;

/// A parsed inbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub original_url: String,
    pub base_url: String,
    pub headers: HeaderMap,
    pub query: Map<String, Value>,
    pub params: Map<String, Value>,
    pub cookies: Map<String, Value>,
    pub signed_cookies: Map<String, Value>,
    pub body: Option<Payload>,
    pub files: Vec<UploadedFile>,
    pub ip: Option<IpAddr>,
    pub protocol: String,
}

impl HttpRequest {
    /// Build the snapshot from request parts and what the chain attached.
    pub fn from_parts(parts: &Parts, params: Map<String, Value>) -> Self {
        let original_url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            original_url,
            base_url: String::new(),
            headers: parts.headers.clone(),
            query: parse_query(parts.uri.query()),
            params,
            cookies: parts
                .extensions
                .get::<Cookies>()
                .map(|c| c.0.clone())
                .unwrap_or_default(),
            signed_cookies: Map::new(),
            body: parts.extensions.get::<ParsedBody>().map(|b| b.0.clone()),
            files: parts
                .extensions
                .get::<UploadedFiles>()
                .map(|f| f.0.clone())
                .unwrap_or_default(),
            ip: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
            protocol: "http".to_string(),
        }
    }

    /// Host header without the port.
    pub fn hostname(&self) -> Option<String> {
        let host = self.headers.get(header::HOST)?.to_str().ok()?;
        let hostname = if host.starts_with('[') {
            // IPv6 literal
            host.split_inclusive(']').next().unwrap_or(host)
        } else {
            host.split(':').next().unwrap_or(host)
        };
        Some(hostname.to_string())
    }

    /// Subdomain labels, nearest the root first, below the two-label domain.
    pub fn subdomains(&self) -> Vec<String> {
        let Some(hostname) = self.hostname() else {
            return Vec::new();
        };
        let bare = hostname.trim_start_matches('[').trim_end_matches(']');
        if bare.parse::<IpAddr>().is_ok() {
            return Vec::new();
        }
        hostname
            .split('.')
            .rev()
            .skip(2)
            .map(str::to_string)
            .collect()
    }

    pub fn secure(&self) -> bool {
        self.protocol == "https"
    }

    /// Sent by `XMLHttpRequest` style clients.
    pub fn xhr(&self) -> bool {
        self.get("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
    }

    /// Forwarded client chain; empty while proxies are untrusted.
    pub fn ips(&self) -> Vec<String> {
        Vec::new()
    }

    /// Header value by case-insensitive name (`Referrer` aliases `Referer`).
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = if name.eq_ignore_ascii_case("referrer") {
            "referer"
        } else {
            name
        };
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// First of `types` matching the request's content type.
    ///
    /// Accepts full types (`application/json`), wildcards (`text/*`),
    /// suffixes (`+json`) and short names (`json`, `urlencoded`,
    /// `multipart`). Requests without a body match nothing.
    pub fn is(&self, types: &[&str]) -> Option<String> {
        if !has_body(&self.headers) {
            return None;
        }
        let actual = media_type(&self.headers)?;
        let essence = actual.essence_str().to_ascii_lowercase();

        types.iter().find_map(|candidate| {
            let expected = normalize_type(candidate)?;
            if !mime_matches(&expected, &actual) {
                return None;
            }
            if expected.contains('*') {
                Some(essence.clone())
            } else {
                Some(candidate.to_string())
            }
        })
    }

    /// Route parameter, then body field, then query value.
    pub fn param(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.params.get(name) {
            return Some(value.clone());
        }
        if let Some(Payload::Json(Value::Object(body))) = &self.body {
            if let Some(value) = body.get(name) {
                return Some(value.clone());
            }
        }
        self.query.get(name).cloned()
    }

    /// Best of `offers` according to `Accept-Charset`.
    pub fn accepts_charsets(&self, offers: &[&str]) -> Option<String> {
        negotiate(self.get("accept-charset"), offers, |entry, offer| {
            entry == "*" || entry.eq_ignore_ascii_case(offer)
        })
    }

    /// Best of `offers` according to `Accept-Language`.
    pub fn accepts_languages(&self, offers: &[&str]) -> Option<String> {
        negotiate(self.get("accept-language"), offers, |entry, offer| {
            let entry = entry.to_ascii_lowercase();
            let offer = offer.to_ascii_lowercase();
            entry == "*"
                || entry == offer
                || offer.starts_with(&format!("{entry}-"))
                || entry.starts_with(&format!("{offer}-"))
        })
    }
}

fn normalize_type(candidate: &str) -> Option<String> {
    let candidate = candidate.trim().to_ascii_lowercase();
    if let Some(suffix) = candidate.strip_prefix('+') {
        return Some(format!("*/*+{suffix}"));
    }
    if candidate.contains('/') {
        return Some(candidate);
    }
    let full = match candidate.as_str() {
        "urlencoded" => "application/x-www-form-urlencoded",
        "multipart" => "multipart/*",
        "json" => "application/json",
        "html" => "text/html",
        "text" | "txt" => "text/plain",
        "xml" => "application/xml",
        "bin" => "application/octet-stream",
        _ => return None,
    };
    Some(full.to_string())
}

fn mime_matches(expected: &str, actual: &mime::Mime) -> bool {
    let Some((type_, subtype)) = expected.split_once('/') else {
        return false;
    };
    if type_ != "*" && !actual.type_().as_str().eq_ignore_ascii_case(type_) {
        return false;
    }
    if let Some(suffix) = subtype.strip_prefix("*+") {
        return actual
            .suffix()
            .is_some_and(|s| s.as_str().eq_ignore_ascii_case(suffix));
    }
    let actual_subtype = match actual.suffix() {
        Some(suffix) => format!("{}+{}", actual.subtype(), suffix),
        None => actual.subtype().to_string(),
    };
    subtype == "*" || actual_subtype.eq_ignore_ascii_case(subtype)
}

/// Parse `a;q=0.5, b` into `(value, quality)` entries.
fn parse_accept(header: &str) -> Vec<(String, f32)> {
    header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let value = pieces.next()?.trim();
            if value.is_empty() {
                return None;
            }
            let quality = pieces
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((value.to_string(), quality))
        })
        .collect()
}

fn negotiate(
    header: Option<&str>,
    offers: &[&str],
    matches: impl Fn(&str, &str) -> bool,
) -> Option<String> {
    let entries = match header.map(str::trim) {
        None | Some("") => return offers.first().map(|o| o.to_string()),
        Some(header) => parse_accept(header),
    };

    let mut best: Option<(&str, f32)> = None;
    for offer in offers {
        let quality = entries
            .iter()
            .filter(|(entry, _)| matches(entry, offer))
            .map(|(_, q)| *q)
            .fold(0.0_f32, f32::max);
        if quality > 0.0 && best.map_or(true, |(_, q)| quality > q) {
            best = Some((*offer, quality));
        }
    }
    best.map(|(offer, _)| offer.to_string())
}

/// Allow-listed view of an [`HttpRequest`].
///
/// Fields are copied at construction; every operation call emits a
/// deprecation warning before delegating.
pub struct RequestFacade {
    pub base_url: String,
    pub body: Option<Payload>,
    pub cookies: Map<String, Value>,
    pub hostname: Option<String>,
    pub ip: Option<IpAddr>,
    pub ips: Vec<String>,
    pub original_url: String,
    pub params: Map<String, Value>,
    pub path: String,
    pub protocol: String,
    pub query: Map<String, Value>,
    pub secure: bool,
    pub signed_cookies: Map<String, Value>,
    pub subdomains: Vec<String>,
    pub xhr: bool,
    native: Arc<HttpRequest>,
    host: Arc<dyn NodeHost>,
}

impl RequestFacade {
    pub fn new(native: Arc<HttpRequest>, host: Arc<dyn NodeHost>) -> Self {
        Self {
            base_url: native.base_url.clone(),
            body: native.body.clone(),
            cookies: native.cookies.clone(),
            hostname: native.hostname(),
            ip: native.ip,
            ips: native.ips(),
            original_url: native.original_url.clone(),
            params: native.params.clone(),
            path: native.path.clone(),
            protocol: native.protocol.clone(),
            query: native.query.clone(),
            secure: native.secure(),
            signed_cookies: native.signed_cookies.clone(),
            subdomains: native.subdomains(),
            xhr: native.xhr(),
            native,
            host,
        }
    }

    fn deprecated(&self, operation: &str) {
        let method = format!("msg.req.{operation}");
        self.host.warn(DEPRECATED_CALL, &[("method", method.as_str())]);
    }

    pub fn param(&self, name: &str) -> Option<Value> {
        self.deprecated("param");
        self.native.param(name)
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.deprecated("get");
        self.native.get(name).map(str::to_string)
    }

    pub fn is(&self, types: &[&str]) -> Option<String> {
        self.deprecated("is");
        self.native.is(types)
    }

    pub fn accepts_charsets(&self, offers: &[&str]) -> Option<String> {
        self.deprecated("acceptsCharsets");
        self.native.accepts_charsets(offers)
    }

    pub fn accepts_languages(&self, offers: &[&str]) -> Option<String> {
        self.deprecated("acceptsLanguages");
        self.native.accepts_languages(offers)
    }

    /// The wrapped request, without warnings.
    pub fn native(&self) -> &HttpRequest {
        &self.native
    }
}

impl fmt::Debug for RequestFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFacade")
            .field("original_url", &self.original_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ChannelHost;
    use axum::http::Request;
    use serde_json::json;

    fn request(builder: axum::http::request::Builder) -> HttpRequest {
        let (parts, _) = builder.body(()).unwrap().into_parts();
        HttpRequest::from_parts(&parts, Map::new())
    }

    #[test]
    fn snapshot_fields() {
        let req = request(
            Request::builder()
                .uri("/things?a=1&b%5Bc%5D=2")
                .header(header::HOST, "api.eu.example.com:1880"),
        );

        assert_eq!(req.path, "/things");
        assert_eq!(req.original_url, "/things?a=1&b%5Bc%5D=2");
        assert_eq!(Value::Object(req.query.clone()), json!({"a": "1", "b": {"c": "2"}}));
        assert_eq!(req.hostname().as_deref(), Some("api.eu.example.com"));
        assert_eq!(req.subdomains(), vec!["eu".to_string(), "api".to_string()]);
        assert!(!req.secure());
    }

    #[test]
    fn ip_hosts_have_no_subdomains() {
        let req = request(Request::builder().uri("/").header(header::HOST, "127.0.0.1:80"));
        assert!(req.subdomains().is_empty());
        let req = request(Request::builder().uri("/").header(header::HOST, "[::1]:80"));
        assert_eq!(req.hostname().as_deref(), Some("[::1]"));
        assert!(req.subdomains().is_empty());
    }

    #[test]
    fn type_matching() {
        let req = request(
            Request::builder()
                .uri("/")
                .header(header::CONTENT_TYPE, "application/vnd.api+json")
                .header(header::CONTENT_LENGTH, "2"),
        );
        assert_eq!(req.is(&["+json"]).as_deref(), Some("application/vnd.api+json"));
        assert_eq!(req.is(&["html", "application/*"]).as_deref(), Some("application/vnd.api+json"));
        assert_eq!(req.is(&["json"]), None);

        let bodiless = request(Request::builder().uri("/").header(header::CONTENT_TYPE, "text/plain"));
        assert_eq!(bodiless.is(&["text"]), None);
    }

    #[test]
    fn param_lookup_order() {
        let mut req = request(Request::builder().uri("/?id=query&q=1"));
        req.params.insert("id".into(), json!("param"));
        req.body = Some(Payload::Json(json!({"id": "body", "b": 2})));

        assert_eq!(req.param("id"), Some(json!("param")));
        assert_eq!(req.param("b"), Some(json!(2)));
        assert_eq!(req.param("q"), Some(json!("1")));
        assert_eq!(req.param("missing"), None);
    }

    #[test]
    fn negotiation() {
        let req = request(
            Request::builder()
                .uri("/")
                .header("accept-language", "fr;q=0.4, en")
                .header("accept-charset", "utf-8;q=0.2, iso-8859-1"),
        );
        assert_eq!(req.accepts_languages(&["fr", "en-GB"]).as_deref(), Some("en-GB"));
        assert_eq!(req.accepts_languages(&["de"]), None);
        assert_eq!(req.accepts_charsets(&["utf-8", "iso-8859-1"]).as_deref(), Some("iso-8859-1"));

        let plain = request(Request::builder().uri("/"));
        assert_eq!(plain.accepts_charsets(&["utf-8"]).as_deref(), Some("utf-8"));
    }

    #[test]
    fn facade_copies_fields_and_warns_on_calls() {
        let (host, _rx) = ChannelHost::new();
        let native = Arc::new(request(
            Request::builder()
                .uri("/x?a=1")
                .header("x-requested-with", "XMLHttpRequest"),
        ));
        let facade = RequestFacade::new(native, host.clone());

        assert!(facade.xhr);
        assert_eq!(facade.path, "/x");
        assert!(host.warnings().is_empty(), "field access is silent");

        assert_eq!(facade.get("X-Requested-With").as_deref(), Some("XMLHttpRequest"));
        assert_eq!(facade.param("a"), Some(json!("1")));
        assert_eq!(
            host.warnings(),
            vec![
                "Deprecated call to msg.req.get".to_string(),
                "Deprecated call to msg.req.param".to_string(),
            ]
        );
    }
}
