//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Node and stages produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and histograms via the metrics facade)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint, when enabled
//! ```

pub mod logging;
pub mod metrics;
