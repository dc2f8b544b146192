//! Paylink SDK - account-side client for the paylink transfer protocol.
//!
//! A [`Client`] connects to a paylink server over TCP, performs the auth
//! exchange to be admitted as an account under the server's prefix, and can
//! then send prepares and answer inbound ones through a caller-supplied
//! handler.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use paylink_sdk::{Client, ClientConfig, RejectingClientHandler};
//!
//! let config = ClientConfig::new("127.0.0.1:7768".parse().unwrap())
//!     .with_suffix("alice")
//!     .with_token("hunter2");
//!
//! let client = Client::connect(config, Arc::new(RejectingClientHandler)).await?;
//! println!("admitted as {}", client.address());
//! ```

#![deny(unsafe_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use paylink_core::{
    Address, AddressError, CodecError, Frame, FrameCodec, FramePayload, Fulfill, Packet, Prepare,
    Reject, RejectCode,
};

/// Default budget for one request/response exchange with the server.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Request identifier used for the auth exchange; payment requests start
/// above it.
const AUTH_REQUEST_ID: u32 = 1;

/// How long to wait for the client task during close.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// I/O error during connect or exchange.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The server returned a malformed address.
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    /// The server refused admission.
    #[error("admission refused: {code} {message}")]
    AuthRefused {
        /// Taxonomy code from the server.
        code: String,
        /// Refusal message.
        message: String,
    },

    /// No response arrived within the time budget.
    #[error("request timed out")]
    Timeout,

    /// The connection to the server ended.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server answered the request with a transfer-level error.
    #[error("peer error {code}: {message}")]
    Peer {
        /// Taxonomy code from the server.
        code: String,
        /// Error message.
        message: String,
    },

    /// The server violated the transfer protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Handles prepares the server forwards to this account.
#[async_trait]
pub trait ClientPrepareHandler: Send + Sync {
    /// Fulfill or reject an inbound prepare. `address` is this account's
    /// own admitted address, for authoring rejections.
    async fn handle_prepare(&self, address: &Address, prepare: Prepare)
        -> Result<Fulfill, Reject>;
}

/// Handler that rejects every inbound prepare as unreachable.
#[derive(Debug, Default)]
pub struct RejectingClientHandler;

#[async_trait]
impl ClientPrepareHandler for RejectingClientHandler {
    async fn handle_prepare(
        &self,
        address: &Address,
        _prepare: Prepare,
    ) -> Result<Fulfill, Reject> {
        Err(Reject::new(
            RejectCode::Unreachable,
            address.clone(),
            "account does not accept payments",
        ))
    }
}

/// Connection parameters for a client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server socket address.
    pub server_addr: SocketAddr,
    /// Proposed account suffix. Empty asks the server to derive one from
    /// the token.
    pub suffix: String,
    /// Shared auth token.
    pub token: String,
    /// Budget for one request/response exchange.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for the given server address.
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            suffix: String::new(),
            token: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Propose an account suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Present an auth token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Set the request/response time budget.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Reply to one of our requests, matched by identifier.
enum ClientReply {
    Response(Packet),
    Ack,
}

enum ClientCommand {
    Send(Frame),
    Close,
}

type PendingMap = Mutex<HashMap<u32, oneshot::Sender<Result<ClientReply, ClientError>>>>;

/// A connected, admitted account.
pub struct Client {
    address: Address,
    request_timeout: Duration,
    pending: Arc<PendingMap>,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    next_request_id: AtomicU32,
    task: JoinHandle<()>,
}

impl Client {
    /// Connect to a server and perform the auth exchange.
    pub async fn connect(
        config: ClientConfig,
        handler: Arc<dyn ClientPrepareHandler>,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(config.server_addr).await?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(error = %e, "failed to set TCP_NODELAY");
        }
        let mut framed = Framed::new(stream, FrameCodec::new());

        framed
            .send(Frame::new(
                AUTH_REQUEST_ID,
                FramePayload::Auth {
                    suffix: config.suffix.clone(),
                    token: config.token.clone(),
                },
            ))
            .await?;

        let reply = tokio::time::timeout(config.request_timeout, framed.next())
            .await
            .map_err(|_| ClientError::Timeout)?
            .ok_or(ClientError::ConnectionClosed)??;

        let address = match reply.payload {
            FramePayload::AuthOk { address } => Address::new(address)?,
            FramePayload::Error(e) => {
                return Err(ClientError::AuthRefused {
                    code: e.code,
                    message: e.message,
                });
            }
            other => {
                return Err(ClientError::Protocol(format!(
                    "unexpected {} frame during auth",
                    other.name()
                )));
            }
        };

        tracing::info!(address = %address, "admitted as account");

        let pending: Arc<PendingMap> = Arc::new(Mutex::new(HashMap::new()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run_client(
            framed,
            address.clone(),
            handler,
            pending.clone(),
            command_tx.clone(),
            command_rx,
        ));

        Ok(Self {
            address,
            request_timeout: config.request_timeout,
            pending,
            command_tx,
            next_request_id: AtomicU32::new(AUTH_REQUEST_ID + 1),
            task,
        })
    }

    /// The admitted account address under the server prefix.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Send a prepare and suspend until its fulfill or reject arrives.
    pub async fn send_prepare(&self, prepare: Prepare) -> Result<Packet, ClientError> {
        match self.request(FramePayload::Prepare(prepare)).await? {
            ClientReply::Response(packet) => Ok(packet),
            ClientReply::Ack => Err(ClientError::Protocol(
                "ack in place of a response".to_string(),
            )),
        }
    }

    /// Send a sub-protocol message and wait for its acknowledgement.
    pub async fn send_message(
        &self,
        protocol: impl Into<String>,
        data: Vec<u8>,
    ) -> Result<(), ClientError> {
        match self
            .request(FramePayload::Message {
                protocol: protocol.into(),
                data,
            })
            .await?
        {
            ClientReply::Ack => Ok(()),
            ClientReply::Response(_) => Err(ClientError::Protocol(
                "response in place of an ack".to_string(),
            )),
        }
    }

    async fn request(&self, payload: FramePayload) -> Result<ClientReply, ClientError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id, tx);

        if self
            .command_tx
            .send(ClientCommand::Send(Frame::new(request_id, payload)))
            .is_err()
        {
            self.pending.lock().remove(&request_id);
            return Err(ClientError::ConnectionClosed);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                // A late reply after this finds no waiter and is dropped.
                self.pending.lock().remove(&request_id);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Flush and close the connection.
    pub async fn close(self) {
        let _ = self.command_tx.send(ClientCommand::Close);
        let _ = tokio::time::timeout(CLOSE_GRACE, self.task).await;
    }
}

async fn run_client(
    mut framed: Framed<TcpStream, FrameCodec>,
    address: Address,
    handler: Arc<dyn ClientPrepareHandler>,
    pending: Arc<PendingMap>,
    command_tx: mpsc::UnboundedSender<ClientCommand>,
    mut command_rx: mpsc::UnboundedReceiver<ClientCommand>,
) {
    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(ClientCommand::Send(frame)) => {
                    if let Err(e) = framed.send(frame).await {
                        tracing::debug!(error = %e, "send failed");
                        break;
                    }
                }
                Some(ClientCommand::Close) | None => break,
            },

            frame = framed.next() => match frame {
                Some(Ok(frame)) => {
                    handle_inbound(frame, &address, &handler, &pending, &command_tx);
                }
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "codec error");
                    break;
                }
                None => {
                    tracing::debug!("connection closed by server");
                    break;
                }
            },
        }
    }

    let _ = framed.close().await;

    // Whoever is still waiting will never get a reply now.
    let waiters: Vec<_> = {
        let mut pending = pending.lock();
        pending.drain().map(|(_, tx)| tx).collect()
    };
    for tx in waiters {
        let _ = tx.send(Err(ClientError::ConnectionClosed));
    }
}

fn handle_inbound(
    frame: Frame,
    address: &Address,
    handler: &Arc<dyn ClientPrepareHandler>,
    pending: &Arc<PendingMap>,
    command_tx: &mpsc::UnboundedSender<ClientCommand>,
) {
    let request_id = frame.request_id;
    match frame.payload {
        // Spawned so a slow handler never stalls reads; concurrent inbound
        // prepares complete independently.
        FramePayload::Prepare(prepare) => {
            let handler = handler.clone();
            let address = address.clone();
            let command_tx = command_tx.clone();
            tokio::spawn(async move {
                let response = match handler.handle_prepare(&address, prepare).await {
                    Ok(fulfill) => Packet::Fulfill(fulfill),
                    Err(reject) => Packet::Reject(reject),
                };
                let _ = command_tx.send(ClientCommand::Send(Frame::new(
                    request_id,
                    FramePayload::Response(response),
                )));
            });
        }

        FramePayload::Response(packet) => {
            resolve(pending, request_id, Ok(ClientReply::Response(packet)));
        }

        FramePayload::Ack => {
            resolve(pending, request_id, Ok(ClientReply::Ack));
        }

        FramePayload::Error(e) => {
            resolve(
                pending,
                request_id,
                Err(ClientError::Peer {
                    code: e.code,
                    message: e.message,
                }),
            );
        }

        FramePayload::Message { protocol, .. } => {
            tracing::debug!(protocol, "acknowledging server message");
            let _ = command_tx.send(ClientCommand::Send(Frame::new(request_id, FramePayload::Ack)));
        }

        FramePayload::Auth { .. } | FramePayload::AuthOk { .. } => {
            tracing::debug!(request_id, "unexpected auth frame dropped");
        }
    }
}

fn resolve(
    pending: &Arc<PendingMap>,
    request_id: u32,
    result: Result<ClientReply, ClientError>,
) {
    match pending.lock().remove(&request_id) {
        Some(tx) => {
            let _ = tx.send(result);
        }
        None => {
            tracing::debug!(request_id, "unmatched reply dropped");
        }
    }
}
