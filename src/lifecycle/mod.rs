//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Node created:
//!     Normalise path → Assemble chain → Bind listener → Listening
//!
//! Node closed (shutdown.rs):
//!     Trigger → Stop accepting → Drain in-flight requests → Done callback
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
