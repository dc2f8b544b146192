//! Account records and admission.
//!
//! This module provides:
//! - Connection identification and per-account metadata
//! - The per-connection auth state machine
//! - The registry owning all account records

pub mod info;
pub mod registry;
pub mod state;

// Re-export main types
pub use info::{AccountId, AccountInfo, AccountSnapshot};
pub use registry::AccountRegistry;
pub use state::ConnectionState;
