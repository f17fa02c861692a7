//! Outbound response handle and its facade.
//!
//! # Responsibilities
//! - Accumulate status and headers set by the flow ([`HttpResponse`])
//! - Deliver the finished response to the waiting connection exactly once
//! - Wrap the handle in an allow-listed [`ResponseFacade`] that warns on
//!   every call and keeps fluent chains on the facade
//!
//! # Design Decisions
//! - A handle dropped without sending resolves the request as a 500
//! - Sending twice is logged and ignored

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::http::body::Payload;
use crate::runtime::i18n::DEPRECATED_CALL;
use crate::runtime::NodeHost;

/// Options for [`HttpResponse::cookie`].
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub max_age_secs: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<String>,
}

const EPOCH_EXPIRY: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Response under construction for one request.
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    msgid: Option<String>,
    reply: Option<oneshot::Sender<Response>>,
}

impl HttpResponse {
    /// A handle and the receiver the connection waits on.
    pub fn channel() -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        let response = Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            msgid: None,
            reply: Some(tx),
        };
        (response, rx)
    }

    /// Correlation id of the message that carries this response.
    pub fn msgid(&self) -> Option<&str> {
        self.msgid.as_deref()
    }

    pub(crate) fn set_msgid(&mut self, msgid: String) {
        self.msgid = Some(msgid);
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_sent(&self) -> bool {
        self.reply.is_none()
    }

    fn insert(&mut self, name: &str, value: &str, append: bool) {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::warn!(header = %name, "Ignoring invalid response header");
            return;
        };
        if append {
            self.headers.append(name, value);
        } else {
            self.headers.insert(name, value);
        }
    }

    pub fn status(&mut self, code: u16) -> &mut Self {
        match StatusCode::from_u16(code) {
            Ok(status) => self.status = status,
            Err(_) => {
                tracing::warn!(code, "Invalid status code, using 500");
                self.status = StatusCode::INTERNAL_SERVER_ERROR;
            }
        }
        self
    }

    /// Replace a header.
    pub fn set(&mut self, name: &str, value: &str) -> &mut Self {
        self.insert(name, value, false);
        self
    }

    /// Add a header value, keeping existing ones.
    pub fn append(&mut self, name: &str, value: &str) -> &mut Self {
        self.insert(name, value, true);
        self
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Set `Content-Type` from a full type or a short name (`json`, `html`).
    pub fn type_(&mut self, content_type: &str) -> &mut Self {
        let full = if content_type.contains('/') {
            content_type.to_string()
        } else {
            lookup_type(content_type).to_string()
        };
        self.set(header::CONTENT_TYPE.as_str(), &full)
    }

    /// Mark the body as a download, optionally naming the file.
    pub fn attachment(&mut self, filename: Option<&str>) -> &mut Self {
        match filename {
            Some(name) => {
                if let Some((_, ext)) = name.rsplit_once('.') {
                    self.type_(ext);
                }
                let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "\\\""));
                self.set(header::CONTENT_DISPOSITION.as_str(), &disposition)
            }
            None => self.set(header::CONTENT_DISPOSITION.as_str(), "attachment"),
        }
    }

    pub fn cookie(&mut self, name: &str, value: &str, options: &CookieOptions) -> &mut Self {
        let mut cookie = format!("{}={}", name, urlencoding::encode(value));
        if let Some(max_age) = options.max_age_secs {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(domain) = &options.domain {
            cookie.push_str(&format!("; Domain={domain}"));
        }
        cookie.push_str(&format!("; Path={}", options.path.as_deref().unwrap_or("/")));
        if options.http_only {
            cookie.push_str("; HttpOnly");
        }
        if options.secure {
            cookie.push_str("; Secure");
        }
        if let Some(same_site) = &options.same_site {
            cookie.push_str(&format!("; SameSite={same_site}"));
        }
        self.append(header::SET_COOKIE.as_str(), &cookie)
    }

    pub fn clear_cookie(&mut self, name: &str, options: &CookieOptions) -> &mut Self {
        let cookie = format!(
            "{}=; Path={}; Expires={}",
            name,
            options.path.as_deref().unwrap_or("/"),
            EPOCH_EXPIRY
        );
        self.append(header::SET_COOKIE.as_str(), &cookie)
    }

    pub fn location(&mut self, url: &str) -> &mut Self {
        self.set(header::LOCATION.as_str(), url)
    }

    /// Add `Link` relations, as `(rel, url)` pairs.
    pub fn links(&mut self, links: &[(&str, &str)]) -> &mut Self {
        let value = links
            .iter()
            .map(|(rel, url)| format!("<{url}>; rel=\"{rel}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let combined = match self.get(header::LINK.as_str()) {
            Some(existing) => format!("{existing}, {value}"),
            None => value,
        };
        self.set(header::LINK.as_str(), &combined)
    }

    /// Add a field to `Vary` unless it is already listed.
    pub fn vary(&mut self, field: &str) -> &mut Self {
        let current = self.get(header::VARY.as_str());
        let listed = current
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .any(|f| f.trim().eq_ignore_ascii_case(field) || f.trim() == "*");
        if !listed {
            let value = match current {
                Some(existing) if !existing.is_empty() => format!("{existing}, {field}"),
                _ => field.to_string(),
            };
            self.set(header::VARY.as_str(), &value);
        }
        self
    }

    /// Send a payload, choosing a content type when none was set.
    pub fn send(&mut self, payload: impl Into<Payload>) -> &mut Self {
        let (body, default_type) = match payload.into() {
            Payload::Text(text) => (Body::from(text), "text/html; charset=utf-8"),
            Payload::Binary(bytes) => (Body::from(bytes), "application/octet-stream"),
            Payload::Json(value) => return self.json(value),
        };
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.set(header::CONTENT_TYPE.as_str(), default_type);
        }
        self.finish(body)
    }

    pub fn json(&mut self, value: impl Into<Value>) -> &mut Self {
        let value: Value = value.into();
        if !self.headers.contains_key(header::CONTENT_TYPE) {
            self.set(header::CONTENT_TYPE.as_str(), "application/json; charset=utf-8");
        }
        self.finish(Body::from(value.to_string()))
    }

    /// Send the status with its reason phrase as the body.
    pub fn send_status(&mut self, code: u16) -> &mut Self {
        self.status(code);
        let reason = self
            .status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| self.status.as_str().to_string());
        self.set(header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8");
        self.finish(Body::from(reason))
    }

    /// Finish without a body.
    pub fn end(&mut self) -> &mut Self {
        self.finish(Body::empty())
    }

    /// Redirect with `302` unless another status is given.
    pub fn redirect(&mut self, status: Option<u16>, url: &str) {
        self.location(url);
        self.status(status.unwrap_or(302));
        let reason = self.status.canonical_reason().unwrap_or("Redirecting");
        let body = format!("{reason}. Redirecting to {url}");
        self.set(header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8");
        self.finish(Body::from(body));
    }

    fn finish(&mut self, body: Body) -> &mut Self {
        let Some(reply) = self.reply.take() else {
            tracing::warn!(msgid = ?self.msgid, "Response already sent");
            return self;
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        if reply.send(response).is_err() {
            tracing::debug!(msgid = ?self.msgid, "Client went away before the response");
        }
        self
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("msgid", &self.msgid)
            .field("sent", &self.headers_sent())
            .finish()
    }
}

fn lookup_type(short: &str) -> &'static str {
    match short.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "json" => "application/json; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "text" | "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "csv" => "text/csv; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Generates facade wrappers for native operations that return the native
/// response; the wrapper returns the facade.
macro_rules! chainable {
    ($( $(#[$doc:meta])* $name:ident as $label:literal ( $($arg:ident : $ty:ty),* ) ; )*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self, $($arg: $ty),*) -> &mut Self {
                self.deprecated($label);
                self.native.$name($($arg),*);
                self
            }
        )*
    };
}

/// Allow-listed view of an [`HttpResponse`] handed to the flow.
pub struct ResponseFacade {
    native: HttpResponse,
    host: Arc<dyn NodeHost>,
}

impl ResponseFacade {
    pub fn new(native: HttpResponse, host: Arc<dyn NodeHost>) -> Self {
        Self { native, host }
    }

    fn deprecated(&self, operation: &str) {
        let method = format!("msg.res.{operation}");
        self.host.warn(DEPRECATED_CALL, &[("method", method.as_str())]);
    }

    chainable! {
        status as "status"(code: u16);
        set as "set"(name: &str, value: &str);
        append as "append"(name: &str, value: &str);
        type_ as "type"(content_type: &str);
        attachment as "attachment"(filename: Option<&str>);
        cookie as "cookie"(name: &str, value: &str, options: &CookieOptions);
        clear_cookie as "clearCookie"(name: &str, options: &CookieOptions);
        location as "location"(url: &str);
        links as "links"(links: &[(&str, &str)]);
        vary as "vary"(field: &str);
        send as "send"(payload: Payload);
        json as "json"(value: Value);
        send_status as "sendStatus"(code: u16);
        end as "end"();
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.deprecated("get");
        self.native.get(name)
    }

    pub fn redirect(&mut self, status: Option<u16>, url: &str) {
        self.deprecated("redirect");
        self.native.redirect(status, url);
    }

    /// The wrapped response, without warnings.
    pub fn native(&self) -> &HttpResponse {
        &self.native
    }

    /// The wrapped response for response nodes, without warnings.
    pub fn native_mut(&mut self) -> &mut HttpResponse {
        &mut self.native
    }

    /// Unwrap the response, keeping anything already set on it.
    pub fn into_native(self) -> HttpResponse {
        self.native
    }
}

impl fmt::Debug for ResponseFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFacade")
            .field("native", &self.native)
            .finish_non_exhaustive()
    }
}
