//! Registry owning all account records.
//!
//! The registry is the sole writer of account state. Admission is
//! observable to the router the moment `admit` returns; removal is
//! idempotent. Lookups by suffix only ever see admitted, live accounts.

use std::collections::HashMap;
use std::net::SocketAddr;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use paylink_core::address::{validate_suffix, Address};

use crate::account::info::{AccountId, AccountInfo, AccountSnapshot};
use crate::account::state::ConnectionState;
use crate::error::AuthError;

/// Connection-handle to account mapping, plus a suffix index for routing.
#[derive(Debug)]
pub struct AccountRegistry {
    server_address: Address,
    accounts: RwLock<HashMap<AccountId, AccountInfo>>,
    by_suffix: RwLock<HashMap<String, AccountId>>,
}

impl AccountRegistry {
    /// Create an empty registry for a server at the given address.
    pub fn new(server_address: Address) -> Self {
        Self {
            server_address,
            accounts: RwLock::new(HashMap::new()),
            by_suffix: RwLock::new(HashMap::new()),
        }
    }

    /// The server's own address.
    pub fn server_address(&self) -> &Address {
        &self.server_address
    }

    /// Register a freshly accepted connection in `Connecting` state.
    pub fn insert(&self, id: AccountId, addr: SocketAddr) {
        self.accounts.write().insert(id, AccountInfo::new(id, addr));
    }

    /// Transition a connection out of `Connecting` on its first frame.
    pub fn mark_authenticating(&self, id: AccountId) {
        if let Some(info) = self.accounts.write().get_mut(&id) {
            if info.state == ConnectionState::Connecting {
                transition(info, ConnectionState::Authenticating);
            }
        }
    }

    /// Admit a connection as an account under the server prefix.
    ///
    /// An empty `proposed_suffix` derives one from the token. Fails when
    /// the suffix is malformed or already held by a live connection.
    pub fn admit(
        &self,
        id: AccountId,
        proposed_suffix: &str,
        token: &str,
    ) -> Result<Address, AuthError> {
        let suffix = if proposed_suffix.is_empty() {
            derive_suffix(token)
        } else {
            proposed_suffix.to_string()
        };

        validate_suffix(&suffix).map_err(|e| AuthError::InvalidSuffix {
            suffix: suffix.clone(),
            reason: e.to_string(),
        })?;

        let mut accounts = self.accounts.write();
        let mut by_suffix = self.by_suffix.write();

        if by_suffix.contains_key(&suffix) {
            return Err(AuthError::DuplicateSuffix(suffix));
        }

        let info = accounts.get_mut(&id).ok_or(AuthError::UnknownConnection)?;

        // child() cannot fail here: the suffix was validated above.
        let address = self
            .server_address
            .child(&suffix)
            .map_err(|e| AuthError::InvalidSuffix {
                suffix: suffix.clone(),
                reason: e.to_string(),
            })?;

        info.suffix = Some(suffix.clone());
        transition(info, ConnectionState::Active);
        by_suffix.insert(suffix, id);

        Ok(address)
    }

    /// Find the live account holding a suffix.
    pub fn lookup(&self, suffix: &str) -> Option<AccountId> {
        self.by_suffix.read().get(suffix).copied()
    }

    /// Remove a connection's record. Idempotent.
    pub fn remove(&self, id: AccountId) -> Option<AccountInfo> {
        let mut accounts = self.accounts.write();
        let mut by_suffix = self.by_suffix.write();

        let mut info = accounts.remove(&id)?;
        if let Some(suffix) = &info.suffix {
            by_suffix.remove(suffix);
        }
        info.state = ConnectionState::Closed;
        Some(info)
    }

    /// Current state of a connection, if it is still registered.
    pub fn state(&self, id: AccountId) -> Option<ConnectionState> {
        self.accounts.read().get(&id).map(|info| info.state)
    }

    /// Whether the connection has been admitted.
    pub fn is_active(&self, id: AccountId) -> bool {
        self.state(id).is_some_and(|s| s.is_active())
    }

    /// The full address of an admitted account.
    pub fn account_address(&self, id: AccountId) -> Option<Address> {
        let accounts = self.accounts.read();
        let suffix = accounts.get(&id)?.suffix.as_deref()?;
        self.server_address.child(suffix).ok()
    }

    /// Allocate the next outbound request identifier for a connection.
    pub fn next_request_id(&self, id: AccountId) -> Option<u32> {
        self.accounts.read().get(&id).map(|info| info.next_request_id())
    }

    /// Record that a frame arrived from a connection.
    pub fn record_recv(&self, id: AccountId) {
        if let Some(info) = self.accounts.write().get_mut(&id) {
            info.record_recv();
        }
    }

    /// Store opaque settlement-hook metadata on an account.
    pub fn set_metadata(&self, id: AccountId, metadata: serde_json::Value) -> bool {
        match self.accounts.write().get_mut(&id) {
            Some(info) => {
                info.metadata = Some(metadata);
                true
            }
            None => false,
        }
    }

    /// Read an account's settlement-hook metadata.
    pub fn metadata(&self, id: AccountId) -> Option<serde_json::Value> {
        self.accounts.read().get(&id)?.metadata.clone()
    }

    /// Snapshot all registered connections.
    pub fn snapshots(&self) -> Vec<AccountSnapshot> {
        self.accounts
            .read()
            .values()
            .map(|info| AccountSnapshot {
                id: info.id,
                addr: info.addr,
                state: info.state,
                suffix: info.suffix.clone(),
            })
            .collect()
    }

    /// Number of registered connections (admitted or not).
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record and suffix mapping.
    pub fn clear(&self) {
        self.accounts.write().clear();
        self.by_suffix.write().clear();
    }
}

fn transition(info: &mut AccountInfo, new_state: ConnectionState) {
    tracing::debug!(
        account = %info.id,
        from = %info.state,
        to = %new_state,
        "connection state transition"
    );
    info.state = new_state;
}

/// Derive a stable account suffix from an auth token.
fn derive_suffix(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..16])
}
