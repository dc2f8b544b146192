//! Per-connection read/write task.
//!
//! Each accepted socket runs in its own tokio task owning the framed
//! stream. Inbound frames and closure are forwarded as events to the single
//! dispatcher channel, preserving per-connection arrival order; outbound
//! frames arrive over an unbounded command channel so sends never block the
//! dispatcher.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use paylink_core::{Frame, FrameCodec};

use crate::account::AccountId;

/// Command to a connection task.
#[derive(Debug)]
pub enum ConnectionCommand {
    /// Write a frame to the peer.
    Send(Frame),
    /// Flush and close the connection.
    Close,
}

/// Event from a connection task to the dispatcher.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A frame arrived from the peer.
    Frame {
        /// Originating connection.
        id: AccountId,
        /// The decoded frame.
        frame: Frame,
    },
    /// The connection ended. Emitted exactly once, last.
    Closed {
        /// The connection that ended.
        id: AccountId,
        /// Why it ended.
        reason: String,
    },
}

/// Spawn the read/write task for an accepted socket.
///
/// Returns the command sender for outbound traffic and the task handle for
/// graceful shutdown.
pub fn spawn_connection(
    id: AccountId,
    addr: SocketAddr,
    stream: TcpStream,
    event_tx: mpsc::Sender<ConnectionEvent>,
) -> (mpsc::UnboundedSender<ConnectionCommand>, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_connection(id, addr, stream, event_tx, command_rx));
    (command_tx, handle)
}

async fn run_connection(
    id: AccountId,
    addr: SocketAddr,
    stream: TcpStream,
    event_tx: mpsc::Sender<ConnectionEvent>,
    mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
) {
    let mut framed = Framed::new(stream, FrameCodec::new());

    let reason = loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(ConnectionCommand::Send(frame)) => {
                    tracing::trace!(account = %id, frame = %frame, "sending frame");
                    if let Err(e) = framed.send(frame).await {
                        break format!("send failed: {e}");
                    }
                }
                Some(ConnectionCommand::Close) | None => {
                    break "closed locally".to_string();
                }
            },

            frame = framed.next() => match frame {
                Some(Ok(frame)) => {
                    tracing::trace!(account = %id, frame = %frame, "received frame");
                    if event_tx
                        .send(ConnectionEvent::Frame { id, frame })
                        .await
                        .is_err()
                    {
                        break "dispatcher gone".to_string();
                    }
                }
                Some(Err(e)) => {
                    break format!("codec error: {e}");
                }
                None => {
                    break "connection closed by peer".to_string();
                }
            },
        }
    };

    // Flush anything still buffered before tearing the socket down.
    let _ = framed.close().await;

    tracing::debug!(account = %id, addr = %addr, reason, "connection ended");
    let _ = event_tx.send(ConnectionEvent::Closed { id, reason }).await;
}

// Driving this task needs a real socket pair; behavior is covered by the
// acceptance tests.
