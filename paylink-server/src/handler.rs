//! Handler seams for locally-addressed traffic.
//!
//! Packets the router decides are local are handed to these collaborators.
//! Failures cross the seam as tagged results, keeping the recognized
//! rejection / unclassified failure distinction explicit at the boundary.

use async_trait::async_trait;

use paylink_core::{Fulfill, Prepare};

use crate::account::AccountId;
use crate::error::HandlerError;

/// Handles prepares addressed to the server itself.
#[async_trait]
pub trait PrepareHandler: Send + Sync {
    /// Fulfill or reject a locally-addressed prepare.
    async fn handle_prepare(&self, prepare: Prepare) -> Result<Fulfill, HandlerError>;
}

/// Handles sub-protocol messages from accounts (settlement hooks).
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process a sub-protocol message from an account.
    async fn handle_message(
        &self,
        from: AccountId,
        protocol: &str,
        data: &[u8],
    ) -> Result<(), HandlerError>;
}

/// Handler that rejects everything with an unreachable code.
///
/// Used by nodes with no local payment logic wired in, so an unconfigured
/// server still answers protocol-correct rejections.
#[derive(Debug, Default)]
pub struct RejectingHandler;

#[async_trait]
impl PrepareHandler for RejectingHandler {
    async fn handle_prepare(&self, prepare: Prepare) -> Result<Fulfill, HandlerError> {
        tracing::debug!(destination = %prepare.destination, "no local handler configured");
        Err(HandlerError::unreachable("no local handler configured"))
    }
}
