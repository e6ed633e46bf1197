//! Session record.
//!
//! The registry is the single source of truth for these; the
//! coordinator fetches, mutates through the registry's atomic
//! operations, and discards its local copy. It never caches a session
//! across calls.

use crate::allocation;
use crate::api::types::{SessionId, SessionSnapshot, SettlementSplit};
use chrono::{DateTime, Utc};
use clearmeter_channel_core::{Address, Amount, ChannelSessionId, SessionKey};
use std::time::Instant;

/// One metered payment session between two participants.
#[derive(Debug, Clone)]
pub struct Session {
    /// Process-local identifier (primary key in the registry).
    pub session_id: SessionId,
    /// Identifier assigned by the clearing node; immutable once set.
    pub channel_session_id: ChannelSessionId,
    /// The paying participant.
    pub participant: Address,
    /// The earning counterparty.
    pub counterparty: Address,
    /// Ephemeral key authorizing the participant's state updates.
    pub participant_key: SessionKey,
    /// Ephemeral key for the counterparty's close signature.
    pub counterparty_key: SessionKey,
    /// Number of accepted usage increments.
    pub usage_count: u64,
    /// Total accrued cost. Never exceeds the initial participant
    /// allocation.
    pub total_cost: Amount,
    /// Allocation fixed at creation; the participant side is the
    /// spending cap.
    pub initial_allocation: SettlementSplit,
    /// Wall-clock creation time, for reporting.
    pub started_at: DateTime<Utc>,
    /// Monotonic creation instant, for duration measurement.
    pub created_at: Instant,
}

impl Session {
    pub fn new(
        channel_session_id: ChannelSessionId,
        participant: Address,
        counterparty: Address,
        participant_key: SessionKey,
        counterparty_key: SessionKey,
        initial_allocation: Amount,
    ) -> Self {
        Session {
            session_id: SessionId::new(),
            channel_session_id,
            participant,
            counterparty,
            participant_key,
            counterparty_key,
            usage_count: 0,
            total_cost: Amount::ZERO,
            initial_allocation: SettlementSplit {
                participant: initial_allocation,
                counterparty: Amount::ZERO,
            },
            started_at: Utc::now(),
            created_at: Instant::now(),
        }
    }

    /// The spending cap fixed at creation.
    pub fn initial_amount(&self) -> Amount {
        self.initial_allocation.participant
    }

    /// Remaining spendable balance.
    pub fn current_balance(&self) -> Amount {
        allocation::current_balance(self.initial_amount(), self.total_cost)
    }

    /// Settlement split at the current accrued cost.
    pub fn split(&self) -> SettlementSplit {
        allocation::settlement_split(self.initial_amount(), self.total_cost)
    }

    pub fn duration(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            channel_session_id: self.channel_session_id.clone(),
            participant: self.participant.clone(),
            counterparty: self.counterparty.clone(),
            usage_count: self.usage_count,
            total_cost: self.total_cost,
            remaining_balance: self.current_balance(),
            initial_allocation: self.initial_allocation,
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        Session::new(
            ChannelSessionId("0xchan".to_string()),
            Address::parse("0x1111111111111111111111111111111111111111").unwrap(),
            Address::parse("0x2222222222222222222222222222222222222222").unwrap(),
            SessionKey::generate(),
            SessionKey::generate(),
            "0.01".parse().unwrap(),
        )
    }

    #[test]
    fn new_sessions_start_unspent() {
        let session = test_session();
        assert_eq!(session.usage_count, 0);
        assert_eq!(session.total_cost, Amount::ZERO);
        assert_eq!(session.current_balance(), "0.01".parse().unwrap());
        assert_eq!(session.initial_allocation.counterparty, Amount::ZERO);
    }

    #[test]
    fn snapshot_reflects_accrued_cost() {
        let mut session = test_session();
        session.usage_count = 3;
        session.total_cost = "0.003".parse().unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.usage_count, 3);
        assert_eq!(snapshot.remaining_balance, "0.007".parse().unwrap());
        assert_eq!(snapshot.total_cost, "0.003".parse().unwrap());
    }
}
