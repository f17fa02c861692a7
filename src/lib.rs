//! HTTP-in node on a dedicated port.
//!
//! Binds one route on its own listener, runs each request through a
//! method-specific middleware chain and hands it to the flow as a
//! [`Message`] whose response handle the flow replies through.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod node;
pub mod observability;
pub mod runtime;

pub use config::{AppConfig, HostSettings, HttpMethod, NodeConfig};
pub use http::body::Payload;
pub use node::HttpInNode;
pub use runtime::{ChannelHost, Message, NodeHost};
