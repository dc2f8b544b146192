//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use paylink_core::Address;

/// Default budget for one correlated request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time a connection may stay unauthenticated before being closed.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum number of concurrently connected accounts.
pub const DEFAULT_MAX_ACCOUNTS: usize = 64;

/// Configuration for the routing engine.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to.
    pub bind_addr: SocketAddr,

    /// The server's own address; accounts are admitted directly beneath it.
    pub address: Address,

    /// Shared secret required at admission. `None` accepts any token.
    pub auth_token: Option<String>,

    /// Budget for one correlated request/response exchange with an account.
    pub request_timeout: Duration,

    /// Time a connection may stay unauthenticated before being closed.
    pub auth_timeout: Duration,

    /// Maximum number of concurrently connected accounts.
    pub max_accounts: usize,
}

impl ServerConfig {
    /// Create a configuration with the given bind address and server address.
    pub fn new(bind_addr: SocketAddr, address: Address) -> Self {
        Self {
            bind_addr,
            address,
            auth_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            max_accounts: DEFAULT_MAX_ACCOUNTS,
        }
    }

    /// Require a shared auth token at admission.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the request/response time budget.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the auth timeout.
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// Set the maximum number of connected accounts.
    pub fn with_max_accounts(mut self, max: usize) -> Self {
        self.max_accounts = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::new(
            "127.0.0.1:0".parse().unwrap(),
            Address::new("test.example").unwrap(),
        )
        .with_auth_token("hunter2")
        .with_request_timeout(Duration::from_millis(250))
        .with_max_accounts(8);

        assert_eq!(config.address.as_str(), "test.example");
        assert_eq!(config.auth_token.as_deref(), Some("hunter2"));
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.max_accounts, 8);
        assert_eq!(config.auth_timeout, DEFAULT_AUTH_TIMEOUT);
    }
}
