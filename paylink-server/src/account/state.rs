//! Per-connection auth state machine.

use std::fmt;

/// State of one account connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Transport established, nothing received yet.
    #[default]
    Connecting,
    /// First frame received, auth exchange in progress.
    Authenticating,
    /// Admitted; payment packets may flow in either direction.
    Active,
    /// Terminal. Set on transport closure or fatal auth failure.
    Closed,
}

impl ConnectionState {
    /// Check if the connection has been admitted.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Active)
    }

    /// Check if the connection is terminal.
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }

    /// Check if the connection is still waiting for admission.
    pub fn is_pending_auth(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Authenticating
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Authenticating => write!(f, "authenticating"),
            ConnectionState::Active => write!(f, "active"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}
