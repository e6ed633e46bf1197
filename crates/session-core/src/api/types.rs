//! API types exposed to callers.

use chrono::{DateTime, Utc};
use clearmeter_channel_core::{Address, Amount, ChannelSessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Process-local session identifier, distinct from the id the clearing
/// node assigns when the channel session opens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("sess-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The pair of allocations after applying accrued cost to the initial
/// allocation. Whenever the cap has been honored,
/// `participant + counterparty` equals the initial allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSplit {
    pub participant: Amount,
    pub counterparty: Amount,
}

/// Result of a successful `start_session`.
#[derive(Debug, Clone)]
pub struct StartedSession {
    pub session_id: SessionId,
    pub channel_session_id: ChannelSessionId,
    pub participant: Address,
    pub counterparty: Address,
    pub initial_allocation: SettlementSplit,
    pub started_at: DateTime<Utc>,
}

/// Result of a successful `increment_usage`.
#[derive(Debug, Clone)]
pub struct UsageReceipt {
    pub session_id: SessionId,
    pub usage_count: u64,
    pub total_cost: Amount,
    pub remaining_balance: Amount,
    pub allocation: SettlementSplit,
    /// Whether the clearing node acknowledged the state update. Local
    /// accounting is authoritative either way; a `false` here means the
    /// interim update will be restated by the next submission.
    pub state_synced: bool,
}

/// Result of a successful `end_session`.
#[derive(Debug, Clone)]
pub struct SettlementSummary {
    pub session_id: SessionId,
    pub channel_session_id: ChannelSessionId,
    pub usage_count: u64,
    pub total_cost: Amount,
    pub duration: Duration,
    pub final_allocation: SettlementSplit,
}

/// Read-only view of a live session, for diagnostics and listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub channel_session_id: ChannelSessionId,
    pub participant: Address,
    pub counterparty: Address,
    pub usage_count: u64,
    pub total_cost: Amount,
    pub remaining_balance: Amount,
    pub initial_allocation: SettlementSplit,
    pub started_at: DateTime<Utc>,
}

/// Aggregate registry statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub total_created: u64,
    pub total_closed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique_and_prefixed() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("sess-"));
    }
}
