//! Pending-request table.
//!
//! Every outbound prepare awaiting a correlated response is tracked here,
//! keyed by `(connection, request identifier)`. Request identifiers are
//! unique only within one connection's lifetime, so the connection handle is
//! part of the key. Each entry arms a one-shot expiry timer; the inbound
//! response path, the timer, and the connection-loss path race to resolve an
//! entry, and the first writer wins. Later resolution attempts find the
//! entry gone and are no-ops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use paylink_core::Packet;

use crate::account::AccountId;
use crate::error::{ServerError, ServerResult};

/// One in-flight request awaiting fulfillment, rejection, or timeout.
struct PendingEntry {
    /// Completion slot; consumed exactly once.
    tx: oneshot::Sender<ServerResult<Packet>>,
    /// Armed expiry timer, aborted on resolution.
    timer: JoinHandle<()>,
}

/// Table of in-flight outbound requests.
#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<(AccountId, u32), PendingEntry>>,
}

impl PendingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new in-flight request and arm its expiry timer.
    ///
    /// The returned receiver completes with the correlated response, a
    /// timeout, or a connection-loss failure, whichever happens first.
    pub fn register(
        self: &Arc<Self>,
        account: AccountId,
        request_id: u32,
        timeout: Duration,
    ) -> oneshot::Receiver<ServerResult<Packet>> {
        let (tx, rx) = oneshot::channel();

        let table = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(table) = table.upgrade() {
                if table.resolve(account, request_id, Err(ServerError::RequestTimeout)) {
                    tracing::debug!(
                        account = %account,
                        request_id,
                        "request timed out"
                    );
                }
            }
        });

        let previous = self
            .entries
            .lock()
            .insert((account, request_id), PendingEntry { tx, timer });

        // The protocol guarantees at most one in-flight request per
        // (connection, id) pair. A stale duplicate only loses its timer.
        if let Some(stale) = previous {
            tracing::warn!(account = %account, request_id, "replaced stale pending request");
            stale.timer.abort();
        }

        rx
    }

    /// Resolve an in-flight request, removing it from the table and
    /// cancelling its timer.
    ///
    /// Returns `false` if the entry was already resolved by another path.
    pub fn resolve(
        &self,
        account: AccountId,
        request_id: u32,
        result: ServerResult<Packet>,
    ) -> bool {
        match self.entries.lock().remove(&(account, request_id)) {
            Some(entry) => {
                entry.timer.abort();
                // The waiting caller may have gone away; that is fine.
                let _ = entry.tx.send(result);
                true
            }
            None => false,
        }
    }

    /// Fail every in-flight request owned by one connection.
    ///
    /// Returns how many requests were failed.
    pub fn fail_account<F>(&self, account: AccountId, make_error: F) -> usize
    where
        F: Fn() -> ServerError,
    {
        let drained: Vec<PendingEntry> = {
            let mut entries = self.entries.lock();
            let keys: Vec<(AccountId, u32)> = entries
                .keys()
                .filter(|(owner, _)| *owner == account)
                .copied()
                .collect();
            keys.into_iter()
                .filter_map(|key| entries.remove(&key))
                .collect()
        };

        let count = drained.len();
        for entry in drained {
            entry.timer.abort();
            let _ = entry.tx.send(Err(make_error()));
        }
        count
    }

    /// Fail every in-flight request in the table.
    ///
    /// Returns how many requests were failed.
    pub fn fail_all<F>(&self, make_error: F) -> usize
    where
        F: Fn() -> ServerError,
    {
        let drained: Vec<PendingEntry> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };

        let count = drained.len();
        for entry in drained {
            entry.timer.abort();
            let _ = entry.tx.send(Err(make_error()));
        }
        count
    }

    /// Number of in-flight requests.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no requests are in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use paylink_core::Fulfill;

    fn fulfill_packet(data: Vec<u8>) -> Packet {
        Packet::Fulfill(Fulfill {
            fulfillment: [0u8; 32],
            data,
        })
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let table = Arc::new(PendingTable::new());
        let account = AccountId::new(1);

        let rx = table.register(account, 7, Duration::from_secs(5));
        assert_eq!(table.len(), 1);

        assert!(table.resolve(account, 7, Ok(fulfill_packet(vec![1]))));
        assert!(table.is_empty());

        let result = rx.await.unwrap().unwrap();
        assert_eq!(result, fulfill_packet(vec![1]));
    }

    #[tokio::test]
    async fn test_double_resolution_is_noop() {
        let table = Arc::new(PendingTable::new());
        let account = AccountId::new(1);

        let rx = table.register(account, 7, Duration::from_secs(5));

        assert!(table.resolve(account, 7, Ok(fulfill_packet(vec![1]))));
        assert!(!table.resolve(account, 7, Ok(fulfill_packet(vec![2]))));

        // The first writer's value is the one the caller sees.
        let result = rx.await.unwrap().unwrap();
        assert_eq!(result, fulfill_packet(vec![1]));
    }

    #[tokio::test]
    async fn test_timeout_fires() {
        let table = Arc::new(PendingTable::new());
        let account = AccountId::new(1);

        let rx = table.register(account, 3, Duration::from_millis(20));

        let result = rx.await.unwrap();
        assert!(matches!(result, Err(ServerError::RequestTimeout)));
        assert!(table.is_empty());

        // A late response after the timeout finds nothing to resolve.
        assert!(!table.resolve(account, 3, Ok(fulfill_packet(vec![]))));
    }

    #[tokio::test]
    async fn test_out_of_order_resolution() {
        let table = Arc::new(PendingTable::new());
        let account = AccountId::new(1);

        let rx_first = table.register(account, 1, Duration::from_secs(5));
        let rx_second = table.register(account, 2, Duration::from_secs(5));

        // Responses are matched by identifier, never by arrival order.
        assert!(table.resolve(account, 2, Ok(fulfill_packet(vec![2]))));
        assert!(table.resolve(account, 1, Ok(fulfill_packet(vec![1]))));

        assert_eq!(rx_first.await.unwrap().unwrap(), fulfill_packet(vec![1]));
        assert_eq!(rx_second.await.unwrap().unwrap(), fulfill_packet(vec![2]));
    }

    #[tokio::test]
    async fn test_same_request_id_on_different_connections() {
        let table = Arc::new(PendingTable::new());
        let first = AccountId::new(1);
        let second = AccountId::new(2);

        let rx_first = table.register(first, 9, Duration::from_secs(5));
        let rx_second = table.register(second, 9, Duration::from_secs(5));

        assert!(table.resolve(second, 9, Ok(fulfill_packet(vec![2]))));
        assert_eq!(rx_second.await.unwrap().unwrap(), fulfill_packet(vec![2]));

        assert!(table.resolve(first, 9, Ok(fulfill_packet(vec![1]))));
        assert_eq!(rx_first.await.unwrap().unwrap(), fulfill_packet(vec![1]));
    }

    #[tokio::test]
    async fn test_fail_account_only_touches_its_owner() {
        let table = Arc::new(PendingTable::new());
        let doomed = AccountId::new(1);
        let healthy = AccountId::new(2);

        let rx_doomed_a = table.register(doomed, 1, Duration::from_secs(5));
        let rx_doomed_b = table.register(doomed, 2, Duration::from_secs(5));
        let rx_healthy = table.register(healthy, 1, Duration::from_secs(5));

        let failed = table.fail_account(doomed, || ServerError::Disconnected);
        assert_eq!(failed, 2);
        assert_eq!(table.len(), 1);

        assert!(matches!(
            rx_doomed_a.await.unwrap(),
            Err(ServerError::Disconnected)
        ));
        assert!(matches!(
            rx_doomed_b.await.unwrap(),
            Err(ServerError::Disconnected)
        ));

        assert!(table.resolve(healthy, 1, Ok(fulfill_packet(vec![]))));
        assert!(rx_healthy.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_fail_all() {
        let table = Arc::new(PendingTable::new());

        let rx_a = table.register(AccountId::new(1), 1, Duration::from_secs(5));
        let rx_b = table.register(AccountId::new(2), 1, Duration::from_secs(5));

        assert_eq!(table.fail_all(|| ServerError::Disconnected), 2);
        assert!(table.is_empty());

        assert!(rx_a.await.unwrap().is_err());
        assert!(rx_b.await.unwrap().is_err());
    }
}
