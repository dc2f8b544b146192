//! Node orchestrator.
//!
//! Owns the server engine and runs it until a shutdown signal arrives.

use std::sync::Arc;

use paylink_server::{RejectingHandler, Server};

use crate::config::NodeConfig;
use crate::shutdown::{self, Shutdown};

/// A runnable paylink node.
pub struct Node {
    config: NodeConfig,
    shutdown: Shutdown,
}

impl Node {
    /// Create a node with the given configuration.
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            shutdown: Shutdown::new(),
        }
    }

    /// A handle for requesting shutdown from outside the run loop.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run the node until SIGINT/SIGTERM or an external shutdown request.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            listen = %self.config.listen_addr,
            address = %self.config.address,
            auth_required = self.config.auth_token.is_some(),
            request_timeout = ?self.config.request_timeout,
            "starting paylink node"
        );

        // Subscribe before binding so a trigger during startup is not lost.
        let mut external = self.shutdown.subscribe();

        // A node without payment logic wired in answers protocol-correct
        // rejections for locally-addressed prepares.
        let server = Server::new(self.config.server_config(), Arc::new(RejectingHandler));
        server.connect().await?;

        tokio::select! {
            _ = shutdown::os_signal() => {}
            _ = external.recv() => {
                tracing::info!("external shutdown requested");
            }
        }

        server.disconnect().await;
        tracing::info!("node stopped");

        Ok(())
    }
}
