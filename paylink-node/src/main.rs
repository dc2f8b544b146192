//! Paylink server node binary.
//!
//! Terminates account connections and routes payment packets between them.

use tracing_subscriber::EnvFilter;

use paylink_node::cli::Cli;
use paylink_node::config::NodeConfig;
use paylink_node::node::Node;

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    init_tracing(&cli.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "paylink node");

    let config = NodeConfig::from_cli(&cli)?;
    Node::new(config).run().await
}
