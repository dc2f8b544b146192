//! Node configuration.

use std::net::SocketAddr;
use std::time::Duration;

use paylink_core::Address;
use paylink_server::ServerConfig;

use crate::cli::Cli;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Listen address for account connections.
    pub listen_addr: SocketAddr,

    /// The server's own address.
    pub address: Address,

    /// Shared auth token, if admission is restricted.
    pub auth_token: Option<String>,

    /// Request/response time budget.
    pub request_timeout: Duration,

    /// Maximum number of concurrently connected accounts.
    pub max_accounts: usize,

    /// Log level.
    pub log_level: String,
}

impl NodeConfig {
    /// Create a node configuration from CLI arguments.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let address = Address::new(cli.address.clone())?;

        Ok(Self {
            listen_addr: cli.listen,
            address,
            auth_token: cli.auth_token.clone(),
            request_timeout: Duration::from_millis(cli.request_timeout_ms),
            max_accounts: cli.max_accounts,
            log_level: cli.log_level.clone(),
        })
    }

    /// Build the server configuration from node config.
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(self.listen_addr, self.address.clone())
            .with_request_timeout(self.request_timeout)
            .with_max_accounts(self.max_accounts);

        if let Some(token) = &self.auth_token {
            config = config.with_auth_token(token.clone());
        }

        config
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:7768".parse().unwrap(),
            address: Address::new("private.paylink").unwrap(),
            auth_token: None,
            request_timeout: Duration::from_secs(30),
            max_accounts: 64,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.listen_addr.port(), 7768);
        assert_eq!(config.address.as_str(), "private.paylink");
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_from_cli() {
        let cli = Cli::parse_from([
            "paylink-node",
            "--address",
            "test.example",
            "--request-timeout-ms",
            "500",
        ]);
        let config = NodeConfig::from_cli(&cli).unwrap();

        assert_eq!(config.address.as_str(), "test.example");
        assert_eq!(config.request_timeout, Duration::from_millis(500));

        let server_config = config.server_config();
        assert_eq!(server_config.request_timeout, Duration::from_millis(500));
        assert_eq!(server_config.address.as_str(), "test.example");
    }

    #[test]
    fn test_invalid_address_refused() {
        let cli = Cli::parse_from(["paylink-node", "--address", "bad..address"]);
        assert!(NodeConfig::from_cli(&cli).is_err());
    }
}
