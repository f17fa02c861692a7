//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! node definition (runtime) / config file (TOML, binary only)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, path normalisation, size parsing)
//!     → NodeConfig + HostSettings (immutable for the node's lifetime)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a node is created; changes mean a redeploy
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{AppConfig, CorsConfig, HostSettings, HttpMethod, NodeConfig, ObservabilityConfig};
