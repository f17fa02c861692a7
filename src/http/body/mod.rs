//! Request body parsing.
//!
//! # Data Flow
//! ```text
//! Request<Body>
//!     → json.rs        (application/json)
//!     → urlencoded.rs  (application/x-www-form-urlencoded)
//!     → multipart.rs   (multipart/*, upload-enabled POST only)
//!     → raw.rs         (anything left; classify.rs picks text vs bytes)
//!     → ParsedBody extension, read by the dispatcher
//! ```
//!
//! Every stage skips a request that already carries [`ParsedBody`]; the
//! first stage that recognises the content wins. `text.rs` replaces the whole
//! sequence for raw-JSON routes.

pub mod classify;
pub mod json;
pub mod multipart;
pub mod raw;
pub mod text;
pub mod urlencoded;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A decoded request body, or any other message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Binary(Bytes),
    /// JSON bodies, URL-encoded forms, multipart fields and query objects.
    Json(Value),
}

impl Payload {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Payload::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Binary(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(Bytes::from(bytes))
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Text(text) => serializer.serialize_str(text),
            Payload::Binary(bytes) => serializer.serialize_bytes(bytes),
            Payload::Json(value) => value.serialize(serializer),
        }
    }
}

/// Request extension: the body has been consumed and decoded.
#[derive(Debug, Clone)]
pub struct ParsedBody(pub Payload);

/// A file part received by the multipart stage, held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub field_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub buffer: Bytes,
    pub size: usize,
}

/// Request extension: files collected by the multipart stage.
#[derive(Debug, Clone, Default)]
pub struct UploadedFiles(pub Vec<UploadedFile>);

/// Bounds applied to every body read.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    pub max_bytes: usize,
    pub read_timeout: Duration,
}

/// Default cap for raw-JSON routes.
pub const TEXT_BODY_MAX_BYTES: usize = 100 * 1024;

impl BodyLimits {
    /// No size cap; only the read timeout applies.
    pub fn unbounded(read_timeout: Duration) -> Self {
        Self {
            max_bytes: usize::MAX,
            read_timeout,
        }
    }
}

impl Default for BodyLimits {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            read_timeout: Duration::from_secs(30),
        }
    }
}

/// Failure while receiving a body.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("request body stream failed: {0}")]
    Stream(String),

    #[error("request size did not match content length (expected {expected}, received {received})")]
    LengthMismatch { expected: u64, received: usize },

    #[error("request entity too large (limit {limit} bytes)")]
    TooLarge { limit: usize },

    #[error("request body not received within {0:?}")]
    Timeout(Duration),
}

/// Failure while interpreting a received body.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("request entity too large (limit {limit} bytes)")]
    TooLarge { limit: usize },

    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON body must be an object or an array")]
    NotObjectOrArray,

    #[error("too many parameters (limit {limit})")]
    TooManyParameters { limit: usize },

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),
}

/// Any per-request failure that ends the chain in the error handler.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    BodyRead(#[from] BodyError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl RequestError {
    /// Body failures during a parsing stage; oversize becomes a parse error.
    pub(crate) fn from_parse_read(err: BodyError) -> Self {
        match err {
            BodyError::TooLarge { limit } => RequestError::Parse(ParseError::TooLarge { limit }),
            other => RequestError::BodyRead(other),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::BodyRead(_) => "body_read",
            RequestError::Parse(_) => "parse",
        }
    }
}

/// Declared `Content-Length`, if present and numeric.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Whether the request announces a body at all.
pub fn has_body(headers: &HeaderMap) -> bool {
    headers.contains_key(header::TRANSFER_ENCODING) || content_length(headers).is_some()
}

/// The `Content-Type` header as text, when it is valid ASCII.
pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

/// Parsed media type of the request, ignoring malformed headers.
pub(crate) fn media_type(headers: &HeaderMap) -> Option<mime::Mime> {
    content_type(headers).and_then(|ct| ct.parse().ok())
}

/// Receive a whole body within the size and time limits.
///
/// A declared length that disagrees with the bytes received is an error.
pub async fn read_body(
    body: Body,
    declared: Option<u64>,
    limits: &BodyLimits,
) -> Result<Bytes, BodyError> {
    if let Some(len) = declared {
        if len > limits.max_bytes as u64 {
            return Err(BodyError::TooLarge {
                limit: limits.max_bytes,
            });
        }
    }

    let collect = Limited::new(body, limits.max_bytes).collect();
    let bytes = match tokio::time::timeout(limits.read_timeout, collect).await {
        Err(_) => return Err(BodyError::Timeout(limits.read_timeout)),
        Ok(Err(e)) if e.is::<LengthLimitError>() => {
            return Err(BodyError::TooLarge {
                limit: limits.max_bytes,
            })
        }
        Ok(Err(e)) => return Err(BodyError::Stream(e.to_string())),
        Ok(Ok(collected)) => collected.to_bytes(),
    };

    if let Some(expected) = declared {
        if bytes.len() as u64 != expected {
            return Err(BodyError::LengthMismatch {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
