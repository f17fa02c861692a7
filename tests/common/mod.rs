//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;

use http_in_node::{ChannelHost, HostSettings, HttpInNode, HttpMethod, Message, NodeConfig};

/// A node listening on an ephemeral loopback port.
pub struct TestNode {
    pub node: HttpInNode,
    pub host: Arc<ChannelHost>,
    pub base_url: String,
}

pub fn settings() -> HostSettings {
    HostSettings {
        bind_host: "127.0.0.1".into(),
        ..HostSettings::default()
    }
}

pub fn route(method: HttpMethod, url: &str) -> NodeConfig {
    NodeConfig {
        url: url.into(),
        method,
        port: 0,
        ..NodeConfig::default()
    }
}

/// Start a node and return it with its message stream.
pub async fn start_node(
    config: NodeConfig,
    settings: HostSettings,
) -> (TestNode, UnboundedReceiver<Message>) {
    let (host, rx) = ChannelHost::new();
    let node = HttpInNode::create(config, &settings, host.clone()).await;
    let addr = node.local_addr().expect("node should be listening");
    let test_node = TestNode {
        node,
        host,
        base_url: format!("http://{addr}"),
    };
    (test_node, rx)
}

/// What the echo responder sends back for a message.
pub fn echo(msg: &Message) -> Value {
    json!({
        "msgid": msg.msgid,
        "payload": msg.payload,
        "params": msg.req.params,
        "cookies": msg.req.cookies,
        "files": msg.req.files.iter().map(|f| json!({
            "field": f.field_name,
            "name": f.original_name,
            "type": f.mime_type,
            "size": f.size,
        })).collect::<Vec<_>>(),
    })
}

/// Answer every message with [`echo`], without facade warnings.
pub fn spawn_echo_responder(mut rx: UnboundedReceiver<Message>) {
    tokio::spawn(async move {
        while let Some(mut msg) = rx.recv().await {
            let body = echo(&msg);
            msg.res.native_mut().json(body);
        }
    });
}

/// Answer every message with a custom handler.
pub fn spawn_responder<F, Fut>(mut rx: UnboundedReceiver<Message>, f: F)
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            tokio::spawn(f(msg));
        }
    });
}
