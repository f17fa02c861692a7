//! Host interface and a channel-backed implementation.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::runtime::i18n;
use crate::runtime::message::Message;

/// What the node needs from the flow runtime hosting it.
pub trait NodeHost: Send + Sync {
    /// Hand a message to the nodes wired after this one.
    fn emit(&self, message: Message);

    /// Fresh correlation id for a message.
    fn new_id(&self) -> String {
        generate_id()
    }

    /// Localised warning on the node's warning channel.
    fn warn(&self, key: &str, params: &[(&str, &str)]);

    /// Persistent status indicator shown next to the node.
    fn set_status(&self, text: &str);

    /// Per-message metric event.
    fn metric(&self, _name: &str, _msgid: &str, _value: f64) {}
}

/// Sixteen hex digits of randomness, the runtime's message id format.
pub fn generate_id() -> String {
    let bytes: [u8; 8] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A metric event recorded by [`ChannelHost`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub msgid: String,
    pub value: f64,
}

#[derive(Debug, Default)]
struct Recorded {
    warnings: Vec<String>,
    status: Option<String>,
    metrics: Vec<MetricSample>,
}

/// Host that forwards messages into an mpsc channel and records the rest.
///
/// Used by the standalone binary and by tests.
#[derive(Debug)]
pub struct ChannelHost {
    tx: mpsc::UnboundedSender<Message>,
    recorded: Mutex<Recorded>,
}

impl ChannelHost {
    /// Create a host and the receiving end of its message channel.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Arc::new(Self {
            tx,
            recorded: Mutex::new(Recorded::default()),
        });
        (host, rx)
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rendered warnings, oldest first.
    pub fn warnings(&self) -> Vec<String> {
        self.recorded().warnings.clone()
    }

    /// The current status text.
    pub fn status(&self) -> Option<String> {
        self.recorded().status.clone()
    }

    /// Metric events, oldest first.
    pub fn metrics(&self) -> Vec<MetricSample> {
        self.recorded().metrics.clone()
    }
}

impl NodeHost for ChannelHost {
    fn emit(&self, message: Message) {
        let msgid = message.msgid.clone();
        if self.tx.send(message).is_err() {
            tracing::warn!(msgid = %msgid, "Message dropped, no receiver");
        }
    }

    fn warn(&self, key: &str, params: &[(&str, &str)]) {
        let text = i18n::render(key, params);
        tracing::warn!(key = %key, "{}", text);
        self.recorded().warnings.push(text);
    }

    fn set_status(&self, text: &str) {
        tracing::info!(status = %text, "Node status changed");
        self.recorded().status = Some(text.to_string());
    }

    fn metric(&self, name: &str, msgid: &str, value: f64) {
        tracing::debug!(metric = %name, msgid = %msgid, value, "Node metric");
        self.recorded().metrics.push(MetricSample {
            name: name.to_string(),
            msgid: msgid.to_string(),
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sixteen_hex_digits() {
        let id = generate_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_id());
    }

    #[test]
    fn records_warnings_and_status() {
        let (host, _rx) = ChannelHost::new();
        host.warn(i18n::MISSING_PATH, &[]);
        host.set_status("down");
        host.metric("m", "id", 1.5);

        assert_eq!(host.warnings(), vec!["missing path".to_string()]);
        assert_eq!(host.status().as_deref(), Some("down"));
        assert_eq!(host.metrics()[0].value, 1.5);
    }
}
