//! Standalone HTTP-in node.
//!
//! Runs a single node from a TOML file (or flags) and answers every message
//! with a JSON echo of what the flow would have received.

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;

use http_in_node::config::loader::{load_config, ConfigError};
use http_in_node::config::validation::validate_config;
use http_in_node::observability::{logging, metrics};
use http_in_node::{AppConfig, ChannelHost, HttpInNode, HttpMethod};

#[derive(Parser)]
#[command(name = "http-in-node")]
#[command(about = "Serve one HTTP-in route on a dedicated port", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Route path, overriding the file
    #[arg(long)]
    url: Option<String>,

    /// HTTP method, overriding the file
    #[arg(short, long, value_parser = parse_method)]
    method: Option<HttpMethod>,

    /// Listener port, overriding the file
    #[arg(short, long)]
    port: Option<u16>,
}

fn parse_method(value: &str) -> Result<HttpMethod, String> {
    serde_json::from_value(json!(value.to_ascii_lowercase()))
        .map_err(|_| format!("unsupported method `{value}`"))
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(url) = &cli.url {
        config.node.url = url.clone();
    }
    if let Some(method) = cli.method {
        config.node.method = method;
    }
    if let Some(port) = cli.port {
        config.node.port = port;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("http-in-node v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (host, mut messages) = ChannelHost::new();
    let responder = tokio::spawn(async move {
        while let Some(mut msg) = messages.recv().await {
            let echo = msg.summary();
            tracing::info!(msgid = %msg.msgid, "Message received");
            msg.res.native_mut().json(echo);
        }
    });

    let node = HttpInNode::create(config.node, &config.settings, host).await;
    if node.is_inert() {
        return Err("node has no path".into());
    }
    if let Some(addr) = node.local_addr() {
        tracing::info!(address = %addr, "Ready");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    node.on_close(move || {
        let _ = done_tx.send(());
    });
    let _ = done_rx.await;
    responder.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
