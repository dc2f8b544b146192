//! Hierarchical dot-segmented addresses.
//!
//! Addresses are strings of one or more segments separated by `.`, e.g.
//! `test.example.alice`. Accounts live directly beneath a server's own
//! address: the server at `test.example` admits accounts at
//! `test.example.<suffix>`, where the suffix is a single segment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

/// A validated hierarchical address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and validate an address.
    pub fn new(s: impl Into<String>) -> Result<Self, AddressError> {
        let s = s.into();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        for segment in s.split('.') {
            validate_segment(segment)?;
        }
        Ok(Self(s))
    }

    /// The address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The address followed by a trailing dot, as used in routing
    /// diagnostics (`test.example.`).
    pub fn prefix(&self) -> String {
        format!("{}.", self.0)
    }

    /// Append a single-segment suffix, producing a child address.
    pub fn child(&self, suffix: &str) -> Result<Self, AddressError> {
        validate_suffix(suffix)?;
        Ok(Self(format!("{}.{}", self.0, suffix)))
    }

    /// Whether `self` is a strict child of `prefix` (at any depth).
    pub fn is_child_of(&self, prefix: &Address) -> bool {
        self.0.len() > prefix.0.len() + 1
            && self.0.starts_with(prefix.as_str())
            && self.0.as_bytes()[prefix.0.len()] == b'.'
    }

    /// The first segment of `self` below `prefix`, if `self` is a strict
    /// child of it. `test.example.alice.sub` below `test.example` yields
    /// `alice`.
    pub fn segment_after<'a>(&'a self, prefix: &Address) -> Option<&'a str> {
        if !self.is_child_of(prefix) {
            return None;
        }
        let rest = &self.0[prefix.0.len() + 1..];
        rest.split('.').next()
    }

    /// Number of segments in the address.
    pub fn segment_count(&self) -> usize {
        self.0.split('.').count()
    }
}

/// Validate a single account suffix (one segment, no dots).
pub fn validate_suffix(suffix: &str) -> Result<(), AddressError> {
    if suffix.contains('.') {
        return Err(AddressError::MultiSegmentSuffix(suffix.to_string()));
    }
    validate_segment(suffix)
}

fn validate_segment(segment: &str) -> Result<(), AddressError> {
    if segment.is_empty()
        || !segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'~' | b'-'))
    {
        return Err(AddressError::InvalidSegment(segment.to_string()));
    }
    Ok(())
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}
