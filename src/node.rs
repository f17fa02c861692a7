//! The HTTP-in node: one route served on its own port.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::validation::normalize_path;
use crate::config::{HostSettings, NodeConfig};
use crate::http::server::{self, with_server_layers, ServerHandle, ServerState};
use crate::http::{build_router, RouteContext};
use crate::runtime::i18n::{INVALID_PATH, MISSING_PATH};
use crate::runtime::NodeHost;

/// A running node instance.
///
/// Creation never fails: a missing or unroutable path leaves the node
/// inert and a bind failure leaves it in [`ServerState::Error`], all
/// reported through the host.
pub struct HttpInNode {
    config: Option<NodeConfig>,
    server: Option<ServerHandle>,
    state: ServerState,
}

impl HttpInNode {
    pub async fn create(config: NodeConfig, settings: &HostSettings, host: Arc<dyn NodeHost>) -> Self {
        let url = match normalize_path(&config.url) {
            Ok(url) => url,
            Err(_) => {
                host.warn(MISSING_PATH, &[]);
                return Self::inert();
            }
        };
        let config = NodeConfig { url, ..config };

        tracing::info!(
            method = %config.method,
            path = %config.url,
            port = config.port,
            upload = config.upload,
            raw_json = config.raw_json,
            "Creating HTTP-in node"
        );

        let route = Arc::new(RouteContext::new(config.clone(), settings, host.clone()));
        let router = match build_router(route, settings) {
            Ok(router) => with_server_layers(router, settings.request_timeout()),
            Err(e) => {
                let error = e.to_string();
                tracing::warn!(path = %config.url, error = %error, "Node path cannot be routed");
                host.warn(INVALID_PATH, &[("path", config.url.as_str()), ("error", error.as_str())]);
                return Self::inert();
            }
        };

        match server::start(&settings.bind_host, config.port, router, host).await {
            Ok(handle) => Self {
                config: Some(config),
                state: handle.state(),
                server: Some(handle),
            },
            Err(e) => {
                tracing::error!(error = %e, "HTTP-in node has no listener");
                Self {
                    config: Some(config),
                    server: None,
                    state: ServerState::Error,
                }
            }
        }
    }

    fn inert() -> Self {
        Self {
            config: None,
            server: None,
            state: ServerState::Unbound,
        }
    }

    /// Configuration in effect, with the normalised path.
    pub fn config(&self) -> Option<&NodeConfig> {
        self.config.as_ref()
    }

    /// Configured without a usable path; nothing was bound.
    pub fn is_inert(&self) -> bool {
        self.config.is_none()
    }

    pub fn state(&self) -> ServerState {
        self.server.as_ref().map_or(self.state, ServerHandle::state)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(ServerHandle::local_addr)
    }

    /// Close the listener, waiting for in-flight requests.
    pub async fn close(self) {
        if let Some(server) = self.server {
            server.close().await;
        }
    }

    /// Close in the background and call `done` once the listener is closed.
    pub fn on_close<F>(self, done: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        tokio::spawn(async move {
            self.close().await;
            done();
        })
    }
}
