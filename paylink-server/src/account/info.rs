//! Account identification and metadata.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use crate::account::state::ConnectionState;

/// Unique identifier for one account connection.
///
/// Owned exclusively by the connection multiplexer; never reused within a
/// server's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub u64);

impl AccountId {
    /// Create an account ID from a counter value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account-{}", self.0)
    }
}

/// One admitted (or admitting) peer connection.
#[derive(Debug)]
pub struct AccountInfo {
    /// Connection identifier.
    pub id: AccountId,
    /// Socket address of the peer.
    pub addr: SocketAddr,
    /// Auth state.
    pub state: ConnectionState,
    /// Account suffix, set at admission.
    pub suffix: Option<String>,
    /// Opaque settlement-hook metadata; never inspected by the router.
    pub metadata: Option<serde_json::Value>,
    /// When the connection was accepted.
    pub connected_at: Instant,
    /// Last time a frame arrived from this connection.
    pub last_recv: Instant,
    /// Outbound request identifier counter for this connection.
    next_request_id: AtomicU32,
}

impl AccountInfo {
    /// Create a record for a freshly accepted connection.
    pub fn new(id: AccountId, addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            addr,
            state: ConnectionState::Connecting,
            suffix: None,
            metadata: None,
            connected_at: now,
            last_recv: now,
            next_request_id: AtomicU32::new(1),
        }
    }

    /// Allocate the next outbound request identifier.
    ///
    /// Identifiers are unique within this connection's lifetime only.
    pub fn next_request_id(&self) -> u32 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Record that a frame arrived.
    pub fn record_recv(&mut self) {
        self.last_recv = Instant::now();
    }
}

/// Snapshot of one account for external reporting.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    /// Connection identifier.
    pub id: AccountId,
    /// Socket address of the peer.
    pub addr: SocketAddr,
    /// Auth state at snapshot time.
    pub state: ConnectionState,
    /// Account suffix, if admitted.
    pub suffix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_display() {
        assert_eq!(format!("{}", AccountId::new(42)), "account-42");
    }

    #[test]
    fn test_request_ids_are_sequential() {
        let info = AccountInfo::new(AccountId::new(1), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(info.next_request_id(), 1);
        assert_eq!(info.next_request_id(), 2);
        assert_eq!(info.next_request_id(), 3);
    }
}
