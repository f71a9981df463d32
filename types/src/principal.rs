//! Principal identifier: the account a balance, proposal or vote belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AgoraError;

/// An opaque account identifier as issued by the external ledger network.
///
/// Agora never interprets the contents; it only requires the identifier to be
/// non-empty, free of whitespace and at most [`PrincipalId::MAX_LEN`] bytes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Longest identifier accepted (covers Stellar-style `G...` keys and muxed accounts).
    pub const MAX_LEN: usize = 128;

    /// Create a principal from a raw string.
    ///
    /// # Panics
    /// Panics if the string is not a valid principal. Use [`PrincipalId::parse`]
    /// for untrusted input.
    pub fn new(raw: impl Into<String>) -> Self {
        let s = raw.into();
        assert!(Self::is_valid_str(&s), "invalid principal: {s:?}");
        Self(s)
    }

    /// Parse a principal from untrusted input.
    pub fn parse(raw: &str) -> Result<Self, AgoraError> {
        if Self::is_valid_str(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(AgoraError::InvalidPrincipal(raw.to_string()))
        }
    }

    /// Return the raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid_str(s: &str) -> bool {
        !s.is_empty() && s.len() <= Self::MAX_LEN && !s.chars().any(char::is_whitespace)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrincipalId {
    type Err = AgoraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
