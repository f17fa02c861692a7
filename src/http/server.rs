//! Dedicated listener for one node.
//!
//! # Responsibilities
//! - Bind the node's own port and serve its router
//! - Track the listener state (`Unbound → Binding → Listening → Closed`,
//!   with `Error` reachable from `Binding` and `Listening`)
//! - Report bind and serve failures on the node status
//! - Close gracefully: stop accepting, drain in-flight requests, then finish
//!
//! # Design Decisions
//! - No retry on bind failure; the node stays unusable until recreated
//! - Serve errors are contained in the server task

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::lifecycle::Shutdown;
use crate::runtime::i18n::SERVER_FAILED_STATUS;
use crate::runtime::NodeHost;

/// Where a listener is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unbound,
    Binding,
    Listening,
    Closed,
    Error,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Unbound => "unbound",
            ServerState::Binding => "binding",
            ServerState::Listening => "listening",
            ServerState::Closed => "closed",
            ServerState::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("listener failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Wrap a node router with the listener-wide layers.
#[allow(deprecated)]
pub fn with_server_layers(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// A listener being served in the background.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<()>,
    state: watch::Sender<ServerState>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn close(self) {
        tracing::info!(address = %self.local_addr, "Closing listener");
        self.shutdown.trigger();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Server task failed");
        }
        self.state.send_if_modified(|state| {
            if *state == ServerState::Error {
                return false;
            }
            *state = ServerState::Closed;
            true
        });
        tracing::info!(address = %self.local_addr, "Listener closed");
    }
}

/// Bind `bind_host:port` and serve `router` until [`ServerHandle::close`].
pub async fn start(
    bind_host: &str,
    port: u16,
    router: Router,
    host: Arc<dyn NodeHost>,
) -> Result<ServerHandle, ServerError> {
    let (state, _) = watch::channel(ServerState::Unbound);
    state.send_replace(ServerState::Binding);

    let addr = format!("{bind_host}:{port}");
    let listener = match TcpListener::bind((bind_host, port)).await {
        Ok(listener) => listener,
        Err(source) => {
            state.send_replace(ServerState::Error);
            host.set_status(SERVER_FAILED_STATUS);
            tracing::error!(address = %addr, error = %source, "Failed to bind listener");
            return Err(ServerError::Bind { addr, source });
        }
    };
    let local_addr = listener.local_addr().map_err(|source| {
        state.send_replace(ServerState::Error);
        host.set_status(SERVER_FAILED_STATUS);
        ServerError::Bind {
            addr: addr.clone(),
            source,
        }
    })?;

    state.send_replace(ServerState::Listening);
    tracing::info!(port = local_addr.port(), address = %local_addr, "Listening on port {}", local_addr.port());

    let shutdown = Shutdown::new();
    let stop = shutdown.wait();
    let task_state = state.clone();
    let task = tokio::spawn(async move {
        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(stop)
            .await;
        if let Err(e) = result.map_err(ServerError::Serve) {
            task_state.send_replace(ServerState::Error);
            host.set_status(SERVER_FAILED_STATUS);
            tracing::error!(error = %e, address = %local_addr, "Listener stopped");
        }
    });

    Ok(ServerHandle {
        local_addr,
        shutdown,
        task,
        state,
    })
}
