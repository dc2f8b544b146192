//! Destination-based packet routing.
//!
//! For every inbound prepare the router decides whether the packet is
//! addressed to the server itself, to one of its connected accounts, or to
//! neither. Only single-level suffix matching is implemented: the first
//! segment below the server prefix selects the account, and anything deeper
//! belongs to that account's own tree. Multi-level account hierarchies are a
//! design extension, not supported here.

use std::sync::Arc;

use paylink_core::Address;

use crate::account::{AccountId, AccountRegistry};

/// Routing decision for one packet. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// The packet is addressed to the server itself.
    Local,
    /// Forward to the account holding the matching suffix.
    Forward(AccountId),
    /// No route exists; carries the diagnostic reason.
    Unroutable(String),
}

/// Routes packets by destination address and optional explicit override.
pub struct Router {
    registry: Arc<AccountRegistry>,
}

impl Router {
    /// Create a router reading account state from the given registry.
    pub fn new(registry: Arc<AccountRegistry>) -> Self {
        Self { registry }
    }

    /// Decide where a packet goes.
    ///
    /// An explicit override is authoritative: the packet is forwarded to the
    /// account the override names, or is unroutable if no such live account
    /// exists, even when the destination alone would have resolved. Without
    /// an override, a destination equal to or nested under the server prefix
    /// with no live matching suffix is handled locally, and a live matching
    /// first segment forwards to that account.
    pub fn route(
        &self,
        destination: &Address,
        explicit_override: Option<&Address>,
    ) -> RoutingDecision {
        let prefix = self.registry.server_address();

        if let Some(over) = explicit_override {
            if let Some(account) = over
                .segment_after(prefix)
                .and_then(|suffix| self.registry.lookup(suffix))
            {
                return RoutingDecision::Forward(account);
            }
            return RoutingDecision::Unroutable(self.diagnostic(Some(over), destination));
        }

        if destination == prefix {
            return RoutingDecision::Local;
        }

        match destination.segment_after(prefix) {
            Some(suffix) => match self.registry.lookup(suffix) {
                Some(account) => RoutingDecision::Forward(account),
                // Nested under our prefix with no live account beneath it.
                None => RoutingDecision::Local,
            },
            None => RoutingDecision::Unroutable(self.diagnostic(None, destination)),
        }
    }

    /// Three-field diagnostic naming the attempted override, the destination
    /// and the server prefix. The exact wording is load-bearing for
    /// operators debugging misdelivered packets.
    fn diagnostic(&self, over: Option<&Address>, destination: &Address) -> String {
        format!(
            "no route found. to={} destination={} prefix={}",
            over.map(Address::as_str).unwrap_or("undefined"),
            destination,
            self.registry.server_address().prefix(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<AccountRegistry>, Router, AccountId) {
        let registry = Arc::new(AccountRegistry::new(
            Address::new("test.example").unwrap(),
        ));
        let id = AccountId::new(1);
        registry.insert(id, "127.0.0.1:9001".parse().unwrap());
        registry.admit(id, "alice", "secret").unwrap();
        let router = Router::new(registry.clone());
        (registry, router, id)
    }

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_own_prefix_is_local() {
        let (_registry, router, _) = setup();
        assert_eq!(router.route(&addr("test.example"), None), RoutingDecision::Local);
    }

    #[test]
    fn test_nested_without_account_is_local() {
        let (_registry, router, _) = setup();
        assert_eq!(
            router.route(&addr("test.example.bob"), None),
            RoutingDecision::Local
        );
        assert_eq!(
            router.route(&addr("test.example.bob.deep.path"), None),
            RoutingDecision::Local
        );
    }

    #[test]
    fn test_live_suffix_forwards() {
        let (_registry, router, alice) = setup();
        assert_eq!(
            router.route(&addr("test.example.alice"), None),
            RoutingDecision::Forward(alice)
        );
        // Deeper hierarchy under an account suffix still forwards to it.
        assert_eq!(
            router.route(&addr("test.example.alice.ledger.7"), None),
            RoutingDecision::Forward(alice)
        );
    }

    #[test]
    fn test_outside_prefix_is_unroutable_with_diagnostic() {
        let (_registry, router, _) = setup();
        match router.route(&addr("can.not.be.reached"), None) {
            RoutingDecision::Unroutable(reason) => {
                assert!(reason.contains(
                    "to=undefined destination=can.not.be.reached prefix=test.example."
                ));
            }
            other => panic!("expected unroutable, got {other:?}"),
        }
    }

    #[test]
    fn test_override_is_authoritative() {
        let (_registry, router, alice) = setup();
        // The destination would be unroutable on its own.
        assert_eq!(
            router.route(
                &addr("can.not.be.reached"),
                Some(&addr("test.example.alice"))
            ),
            RoutingDecision::Forward(alice)
        );
        // The destination would resolve locally on its own.
        assert_eq!(
            router.route(&addr("test.example"), Some(&addr("test.example.alice"))),
            RoutingDecision::Forward(alice)
        );
    }

    #[test]
    fn test_override_to_unknown_account_is_unroutable() {
        let (_registry, router, _) = setup();
        // Even a locally-resolvable destination does not save a bad override.
        match router.route(&addr("test.example"), Some(&addr("test.example.bob"))) {
            RoutingDecision::Unroutable(reason) => {
                assert!(reason.contains("to=test.example.bob"));
                assert!(reason.contains("destination=test.example"));
                assert!(reason.contains("prefix=test.example."));
            }
            other => panic!("expected unroutable, got {other:?}"),
        }
    }

    #[test]
    fn test_removed_account_stops_routing() {
        let (registry, router, alice) = setup();
        assert_eq!(
            router.route(&addr("test.example.alice"), None),
            RoutingDecision::Forward(alice)
        );

        registry.remove(alice);
        assert_eq!(
            router.route(&addr("test.example.alice"), None),
            RoutingDecision::Local
        );
    }
}
