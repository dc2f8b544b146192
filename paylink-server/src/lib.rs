//! Account connection and packet routing engine for the paylink transfer
//! protocol.
//!
//! The server terminates many independent peer links, admits each as an
//! account directly beneath its own address prefix, and exchanges payment
//! packets (prepare / fulfill / reject) between those accounts and a local
//! handler:
//!
//! - Connection admission and auth binding per account
//! - Per-account request/response correlation under a bounded time budget
//! - Destination-based routing: local, forward-to-account, explicit
//!   override, or unroutable
//! - Translation of every packet-path failure into a protocol-compliant
//!   rejection
//!
//! # Architecture
//!
//! Each accepted socket runs in its own tokio task. A single dispatcher
//! task consumes events from all connections, preserving per-connection
//! arrival order, and spawns payment flows so a suspended exchange never
//! blocks unrelated frames.
//!
//! ```text
//! Server (connect/disconnect/send_packet)
//! ├── Listener Task (accept, admit to registry)
//! ├── Connection Task 1 (read/write loop)
//! ├── Connection Task 2 (read/write loop)
//! └── Dispatcher Task (classify, route, correlate)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use paylink_core::Address;
//! use paylink_server::{RejectingHandler, Server, ServerConfig};
//!
//! let config = ServerConfig::new(
//!     "0.0.0.0:7768".parse().unwrap(),
//!     Address::new("private.paylink").unwrap(),
//! );
//! let server = Server::new(config, Arc::new(RejectingHandler));
//! server.connect().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod account;
pub mod config;
pub mod error;

pub mod connection;
pub mod dispatch;
pub mod handler;
pub mod pending;
pub mod reject;
pub mod router;
pub mod server;

// Re-export main types
pub use account::{AccountId, AccountRegistry, AccountSnapshot, ConnectionState};
pub use config::ServerConfig;
pub use error::{AuthError, HandlerError, ServerError, ServerResult};
pub use handler::{MessageHandler, PrepareHandler, RejectingHandler};
pub use pending::PendingTable;
pub use reject::reject_for;
pub use router::{Router, RoutingDecision};
pub use server::Server;
