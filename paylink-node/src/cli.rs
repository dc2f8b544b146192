//! Command-line argument parsing.

use std::net::SocketAddr;

use clap::Parser;

/// Paylink server node.
#[derive(Parser, Debug, Clone)]
#[command(name = "paylink-node")]
#[command(about = "Paylink server node binary")]
#[command(version)]
pub struct Cli {
    /// Listen address for account connections.
    #[arg(long, default_value = "0.0.0.0:7768")]
    pub listen: SocketAddr,

    /// The server's own address; accounts are admitted directly beneath it.
    #[arg(long, default_value = "private.paylink")]
    pub address: String,

    /// Shared auth token required at admission. Omit to accept any token.
    #[arg(long)]
    pub auth_token: Option<String>,

    /// Request/response time budget in milliseconds.
    #[arg(long, default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    /// Maximum number of concurrently connected accounts.
    #[arg(long, default_value_t = 64)]
    pub max_accounts: usize,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cli = Cli::parse_from(["paylink-node"]);
        assert_eq!(cli.listen.port(), 7768);
        assert_eq!(cli.address, "private.paylink");
        assert!(cli.auth_token.is_none());
        assert_eq!(cli.request_timeout_ms, 30_000);
        assert_eq!(cli.max_accounts, 64);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_auth_token_flag() {
        let cli = Cli::parse_from(["paylink-node", "--auth-token", "hunter2"]);
        assert_eq!(cli.auth_token.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_custom_address() {
        let cli = Cli::parse_from(["paylink-node", "--address", "test.example"]);
        assert_eq!(cli.address, "test.example");
    }
}
