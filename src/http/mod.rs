//! HTTP handling for the node's dedicated listener.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (listener, timeout and trace layers)
//!     → chain.rs (per-route stages, see middleware/ and body/)
//!     → dispatch.rs (message with request.rs + response.rs facades)
//!     → flow replies through the response handle
//!     → Send to client
//! ```

pub mod body;
pub mod chain;
pub mod cors;
pub mod dispatch;
pub mod middleware;
pub mod path;
pub mod request;
pub mod response;
pub mod server;

pub use chain::{assemble, build_router, RouteContext, Stage};
pub use request::{HttpRequest, RequestFacade};
pub use response::{CookieOptions, HttpResponse, ResponseFacade};
pub use server::{ServerError, ServerHandle, ServerState};
