//! Execution condition hashing.
//!
//! A prepare carries the SHA-256 digest of a secret preimage; the matching
//! fulfill carries the preimage itself. The routing layer passes both
//! through untouched, but endpoints verify the pair with these helpers.

use sha2::{Digest, Sha256};

/// Compute the execution condition for a fulfillment preimage.
pub fn condition_for(fulfillment: &[u8; 32]) -> [u8; 32] {
    let digest = Sha256::digest(fulfillment);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Check whether a fulfillment satisfies an execution condition.
pub fn fulfillment_matches(condition: &[u8; 32], fulfillment: &[u8; 32]) -> bool {
    condition_for(fulfillment) == *condition
}
