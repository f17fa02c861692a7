//! Runtime collaborators.
//!
//! The node never talks to the flow runtime directly; everything goes
//! through [`NodeHost`]:
//! ```text
//! dispatcher  → emit(Message), new_id()
//! facades     → warn(deprecated-call)
//! error stage → warn(request-failed)
//! lifecycle   → set_status(..)
//! metrics     → metric(name, msgid, value)
//! ```

pub mod host;
pub mod i18n;
pub mod message;

pub use host::{generate_id, ChannelHost, MetricSample, NodeHost};
pub use message::Message;
