//! Frame dispatch and the per-connection protocol state machine.
//!
//! The dispatcher consumes the single event channel fed by every connection
//! task, classifies frames by sub-protocol, enforces the
//! `Connecting → Authenticating → Active → Closed` lifecycle, and drives
//! payment flows through the router. Prepare and message flows are spawned
//! so a suspended exchange never blocks dispatch of unrelated frames.

use std::sync::Arc;

use paylink_core::{Address, Frame, FramePayload, Packet, Prepare, RejectCode};

use crate::account::AccountId;
use crate::connection::ConnectionEvent;
use crate::error::{AuthError, HandlerError, ServerError, ServerResult};
use crate::reject::reject_for;
use crate::router::RoutingDecision;
use crate::server::Engine;

impl Engine {
    /// Process one event from a connection task.
    pub(crate) async fn handle_event(self: &Arc<Self>, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Frame { id, frame } => self.handle_frame(id, frame).await,
            ConnectionEvent::Closed { id, reason } => self.handle_closed(id, &reason),
        }
    }

    async fn handle_frame(self: &Arc<Self>, id: AccountId, frame: Frame) {
        // A frame can still be in the channel after its connection record
        // was torn down; nothing to do for it.
        let Some(state) = self.registry.state(id) else {
            return;
        };
        self.registry.record_recv(id);

        if state.is_closed() {
            return;
        }
        if state == crate::account::ConnectionState::Connecting {
            self.registry.mark_authenticating(id);
        }

        let request_id = frame.request_id;
        match frame.payload {
            FramePayload::Auth { suffix, token } => {
                self.handle_auth(id, request_id, &suffix, &token);
            }

            // Anything but an auth exchange before admission is fatal.
            payload if !self.registry.is_active(id) => {
                tracing::warn!(
                    account = %id,
                    frame = payload.name(),
                    "frame before authentication"
                );
                self.send_error_frame(
                    id,
                    request_id,
                    RejectCode::Unauthorized,
                    "authenticate first",
                );
                self.close_connection(id);
            }

            FramePayload::Prepare(prepare) => {
                let engine = Arc::clone(self);
                tokio::spawn(async move {
                    engine.process_prepare(id, request_id, prepare).await;
                });
            }

            FramePayload::Response(packet) => {
                self.handle_response(id, request_id, packet);
            }

            FramePayload::Error(error) => {
                // A transfer-level failure answers the request with the
                // same identifier; callers see it like a transport failure.
                let failure = ServerError::Transport(format!(
                    "peer error {}: {}",
                    error.code, error.message
                ));
                if !self.pending.resolve(id, request_id, Err(failure)) {
                    tracing::debug!(account = %id, request_id, "unmatched error frame dropped");
                }
            }

            FramePayload::Message { protocol, data } => {
                let engine = Arc::clone(self);
                tokio::spawn(async move {
                    engine.process_message(id, request_id, protocol, data).await;
                });
            }

            // The server never initiates auth or message exchanges toward
            // accounts, so these have no pending request to correlate with.
            FramePayload::AuthOk { .. } | FramePayload::Ack => {
                tracing::debug!(account = %id, request_id, "unexpected frame dropped");
            }
        }
    }

    fn handle_auth(&self, id: AccountId, request_id: u32, suffix: &str, token: &str) {
        if self.registry.is_active(id) {
            // Protocol misuse on a live connection answers with an error;
            // the connection stays open.
            self.send_error_frame(
                id,
                request_id,
                RejectCode::BadRequest,
                "already authenticated",
            );
            return;
        }

        let result = self
            .check_token(token)
            .and_then(|()| self.registry.admit(id, suffix, token));

        match result {
            Ok(address) => {
                tracing::info!(account = %id, address = %address, "account admitted");
                let reply = Frame::new(
                    request_id,
                    FramePayload::AuthOk {
                        address: address.to_string(),
                    },
                );
                if let Err(e) = self.send_frame(id, reply) {
                    tracing::debug!(account = %id, error = %e, "failed to send auth reply");
                }
            }
            Err(e) => {
                tracing::warn!(account = %id, error = %e, "admission refused");
                self.send_error_frame(id, request_id, RejectCode::Unauthorized, &e.to_string());
                self.close_connection(id);
            }
        }
    }

    fn check_token(&self, token: &str) -> Result<(), AuthError> {
        match &self.config.auth_token {
            Some(expected) if expected != token => Err(AuthError::BadToken),
            _ => Ok(()),
        }
    }

    /// Run one inbound prepare to completion and answer the originator.
    async fn process_prepare(self: Arc<Self>, from: AccountId, request_id: u32, prepare: Prepare) {
        let response = match self.execute_prepare(prepare, None).await {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(account = %from, error = %e, "prepare failed");
                Packet::Reject(reject_for(&e, self.server_address()))
            }
        };

        let frame = Frame::new(request_id, FramePayload::Response(response));
        if let Err(e) = self.send_frame(from, frame) {
            tracing::debug!(account = %from, error = %e, "failed to deliver response");
        }
    }

    /// Route a prepare and carry out the resulting exchange.
    ///
    /// A forwarded peer's fulfill or reject is relayed back unchanged.
    pub(crate) async fn execute_prepare(
        self: &Arc<Self>,
        prepare: Prepare,
        explicit_override: Option<&Address>,
    ) -> ServerResult<Packet> {
        match self.router.route(&prepare.destination, explicit_override) {
            RoutingDecision::Local => {
                let fulfill = self.prepare_handler.handle_prepare(prepare).await?;
                Ok(Packet::Fulfill(fulfill))
            }
            RoutingDecision::Forward(account) => self.send_to_account(account, prepare).await,
            RoutingDecision::Unroutable(reason) => Err(ServerError::Unroutable { reason }),
        }
    }

    /// Send a prepare to an account and suspend until its correlated
    /// response, a timeout, or connection loss, whichever comes first.
    pub(crate) async fn send_to_account(
        self: &Arc<Self>,
        account: AccountId,
        prepare: Prepare,
    ) -> ServerResult<Packet> {
        let request_id = self
            .registry
            .next_request_id(account)
            .ok_or(ServerError::AccountNotFound(account))?;

        let rx = self
            .pending
            .register(account, request_id, self.config.request_timeout);

        let frame = Frame::new(request_id, FramePayload::Prepare(prepare));
        if let Err(e) = self.send_frame(account, frame) {
            // The entry was just created; hand the send failure to its
            // waiter through the normal resolution path.
            self.pending.resolve(account, request_id, Err(e));
        }

        match rx.await {
            Ok(result) => result,
            // The table was dropped without resolving us; only happens
            // during teardown.
            Err(_) => Err(ServerError::Shutdown),
        }
    }

    fn handle_response(&self, from: AccountId, request_id: u32, packet: Packet) {
        match packet {
            Packet::Prepare(_) => {
                tracing::warn!(account = %from, request_id, "prepare inside response dropped");
            }
            packet => {
                if !self.pending.resolve(from, request_id, Ok(packet)) {
                    // Late or duplicate; the request already timed out or
                    // resolved through another path.
                    tracing::debug!(account = %from, request_id, "unmatched response dropped");
                }
            }
        }
    }

    /// Invoke the settlement hook for a sub-protocol message, then
    /// acknowledge it.
    async fn process_message(
        self: Arc<Self>,
        from: AccountId,
        request_id: u32,
        protocol: String,
        data: Vec<u8>,
    ) {
        let result = match &self.message_handler {
            Some(handler) => handler.handle_message(from, &protocol, &data).await,
            None => {
                tracing::debug!(account = %from, protocol, "no message handler installed");
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.send_frame(from, Frame::new(request_id, FramePayload::Ack)) {
                    tracing::debug!(account = %from, error = %e, "failed to ack message");
                }
            }
            Err(HandlerError::Reject { code, message }) => {
                self.send_error_frame(from, request_id, code, &message);
            }
            Err(HandlerError::Internal(detail)) => {
                tracing::error!(account = %from, protocol, detail, "message handler failed");
                self.send_error_frame(
                    from,
                    request_id,
                    RejectCode::InternalError,
                    "internal server error",
                );
            }
        }
    }

    /// Tear down everything owned by a closed connection.
    pub(crate) fn handle_closed(&self, id: AccountId, reason: &str) {
        self.connections.write().remove(&id);
        self.tasks.lock().remove(&id);

        // Fail the connection's in-flight requests before it disappears
        // from routing.
        let failed = self.pending.fail_account(id, || ServerError::Disconnected);

        if let Some(info) = self.registry.remove(id) {
            tracing::info!(
                account = %id,
                suffix = ?info.suffix,
                reason,
                failed_requests = failed,
                "connection removed"
            );
        }
    }
}
