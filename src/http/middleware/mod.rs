//! Per-route middleware stages that are not body parsers.
//!
//! # Data Flow
//! ```text
//! error (outermost)
//!     → cookies
//!     → host middleware, in configured order
//!     → cors
//!     → metrics
//!     → body stages
//!     → dispatch
//! ```

pub mod cookies;
pub mod error;
pub mod host;
pub mod metrics;
