//! Core identifier types shared across the protocol and session layers.

use crate::errors::ChannelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An EVM-style participant address (`0x` + 40 hex digits).
///
/// Addresses compare and hash exactly as given; callers that need
/// case-insensitive identity (the registry's one-session-per-participant
/// rule) key on [`Address::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Parse and validate an address string.
    pub fn parse(s: &str) -> Result<Self, ChannelError> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| ChannelError::InvalidAddress(format!("{}: missing 0x prefix", s)))?;
        if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChannelError::InvalidAddress(format!(
                "{}: expected 40 hex digits",
                s
            )));
        }
        Ok(Address(s.to_string()))
    }

    /// Construct without validation. For addresses produced internally
    /// (key derivation) where the format is already guaranteed.
    pub(crate) fn from_raw(s: String) -> Self {
        Address(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased form, the canonical key for participant identity.
    pub fn normalized(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Case-insensitive equality.
    pub fn matches(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identifier the clearing node assigns when a session opens.
/// Distinct from the locally generated session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelSessionId(pub String);

impl ChannelSessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
