//! Configuration schema definitions.
//!
//! This module defines the node configuration, the host settings the node
//! reads from the runtime, and the file layout used by the standalone binary.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use axum::routing::MethodFilter;
use serde::{Deserialize, Serialize};

use crate::http::middleware::host::HttpNodeMiddleware;

/// Root configuration for the standalone binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// The node instance to run.
    pub node: NodeConfig,

    /// Runtime-wide settings the node reads.
    pub settings: HostSettings,

    /// Logging and metrics exposition.
    pub observability: ObservabilityConfig,
}

/// HTTP method a node binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
        }
    }

    /// Methods whose payload is the request body.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }

    pub fn filter(&self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Patch => MethodFilter::PATCH,
            HttpMethod::Delete => MethodFilter::DELETE,
            HttpMethod::Options => MethodFilter::OPTIONS,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-node route configuration.
///
/// Fixed at node creation; a redeploy builds a new node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Route path. Express-style `:name` segments become `req.params`.
    pub url: String,

    /// Bound HTTP verb; also selects the payload rule.
    pub method: HttpMethod,

    /// Dedicated listener port (0 picks an ephemeral port).
    pub port: u16,

    /// Accept `multipart/*` uploads (POST only).
    pub upload: bool,

    /// Treat the whole body as text regardless of its content type (POST/PUT).
    #[serde(alias = "rawJson")]
    pub raw_json: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: HttpMethod::Get,
            port: 8080,
            upload: false,
            raw_json: false,
        }
    }
}

/// CORS policy, mirroring the options of the common `cors` middleware.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any.
    pub origin: Vec<String>,

    /// Methods announced in preflight responses.
    pub methods: Vec<String>,

    /// Allowed request headers; empty mirrors the preflight request.
    pub allowed_headers: Vec<String>,

    /// Response headers exposed to the browser.
    pub exposed_headers: Vec<String>,

    pub credentials: bool,

    /// Preflight cache lifetime.
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origin: vec!["*".to_string()],
            methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            credentials: false,
            max_age_secs: None,
        }
    }
}

/// Settings the node looks up from its host runtime.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostSettings {
    /// Interface the dedicated listener binds to.
    pub bind_host: String,

    /// CORS policy; `None` makes the CORS stage a pass-through.
    pub cors: Option<CorsConfig>,

    /// Body size cap for the JSON, form and multipart stages (e.g. "5mb",
    /// "100kb", "1024").
    pub max_body_size: String,

    /// Body size cap for the raw stage; `None` leaves it unbounded.
    pub raw_body_max_size: Option<String>,

    /// Body size cap for raw-JSON routes.
    pub text_body_max_size: String,

    /// Report response time and size through the host metric hook.
    pub metrics_enabled: bool,

    /// Upper bound for receiving a request body, in seconds.
    pub body_read_timeout_secs: u64,

    /// Upper bound for the whole request/response exchange, in seconds.
    pub request_timeout_secs: u64,

    /// Host-supplied middleware run after cookie parsing, in order.
    #[serde(skip)]
    pub middleware: Vec<HttpNodeMiddleware>,
}

impl HostSettings {
    pub fn body_read_timeout(&self) -> Duration {
        Duration::from_secs(self.body_read_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            cors: None,
            max_body_size: "5mb".to_string(),
            raw_body_max_size: None,
            text_body_max_size: "100kb".to_string(),
            metrics_enabled: false,
            body_read_timeout_secs: 30,
            request_timeout_secs: 120,
            middleware: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
