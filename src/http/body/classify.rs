//! Content classification for the raw body stage.
//!
//! Decides from `Content-Type` alone whether an otherwise unparsed body is
//! text, opaque bytes, or bytes that become text when they are valid UTF-8.

use axum::http::HeaderMap;

use crate::http::body::content_type;

/// How the raw body stage treats a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Decode as UTF-8 text.
    Text,
    /// Keep the bytes untouched.
    BinaryRaw,
    /// Keep the bytes, but turn them into text if they are valid UTF-8.
    BinaryCheckUtf8,
}

/// `application/*` subtypes that are never sniffed for UTF-8.
const OPAQUE_APPLICATION_SUBTYPES: [&str; 3] = ["octet-stream", "cbor", "x-protobuf"];

/// Classify a raw `Content-Type` value. Absent or malformed headers are text.
pub fn classify(content_type: Option<&str>) -> Verdict {
    let Some(raw) = content_type else {
        return Verdict::Text;
    };
    let Ok(media) = raw.trim().parse::<mime::Mime>() else {
        tracing::debug!(content_type = %raw, "Unparseable content type, treating body as text");
        return Verdict::Text;
    };

    let is = |name: &str, expected: &str| name.eq_ignore_ascii_case(expected);
    let type_ = media.type_().as_str();
    let subtype = media.subtype().as_str();
    let suffix = media.suffix().map(|s| s.as_str());

    if is(type_, "text") {
        Verdict::Text
    } else if is(subtype, "xml") || suffix.is_some_and(|s| is(s, "xml")) {
        Verdict::Text
    } else if !is(type_, "application") {
        Verdict::BinaryRaw
    } else if OPAQUE_APPLICATION_SUBTYPES.iter().any(|s| is(subtype, s)) {
        Verdict::BinaryRaw
    } else {
        Verdict::BinaryCheckUtf8
    }
}

/// Classify a request from its headers.
pub fn classify_headers(headers: &HeaderMap) -> Verdict {
    if !headers.contains_key(axum::http::header::CONTENT_TYPE) {
        return Verdict::Text;
    }
    // Non-ASCII header bytes count as malformed.
    classify(content_type(headers))
}
