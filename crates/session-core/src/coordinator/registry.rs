//! Session registry.
//!
//! The single source of truth for session existence, usage counters and
//! cost totals, and the sole serialization point in the system. Backed
//! by sharded concurrent maps so operations on different sessions do
//! not contend; mutual exclusion per session comes from holding the
//! shard entry across the check-and-mutate, never from a global lock.
//!
//! Participant uniqueness is enforced through a secondary index keyed
//! by the normalized (lowercased) address, so two concurrent starts for
//! the same participant cannot both pass the duplicate check.

use crate::api::types::{SessionId, SessionStats};
use crate::errors::{Result, SessionError};
use crate::session::Session;
use clearmeter_channel_core::{Address, Amount};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Primary storage.
    sessions: DashMap<SessionId, Session>,
    /// Normalized participant address -> session id.
    by_participant: DashMap<String, SessionId>,
    total_created: AtomicU64,
    total_closed: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new session. Fails with `AlreadyActive` if the
    /// participant (case-insensitive) already has one; the
    /// check-and-insert is atomic on the participant index entry.
    pub fn create(&self, session: Session) -> Result<()> {
        let key = session.participant.normalized();
        match self.by_participant.entry(key) {
            Entry::Occupied(existing) => Err(SessionError::AlreadyActive {
                participant: session.participant.to_string(),
                existing_session_id: existing.get().clone(),
            }),
            Entry::Vacant(slot) => {
                let session_id = session.session_id.clone();
                slot.insert(session_id.clone());
                self.sessions.insert(session_id.clone(), session);
                self.total_created.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Registered session {}", session_id);
                Ok(())
            }
        }
    }

    /// Fetch a session by id.
    pub fn get(&self, session_id: &SessionId) -> Result<Session> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::not_found(session_id))
    }

    /// Fetch a session by participant address, case-insensitively.
    pub fn get_by_participant(&self, participant: &Address) -> Option<Session> {
        let session_id = self
            .by_participant
            .get(&participant.normalized())
            .map(|entry| entry.value().clone())?;
        self.sessions
            .get(&session_id)
            .map(|entry| entry.value().clone())
    }

    /// Atomically check the balance cap and, if it holds, apply one
    /// usage increment of `cost`. The check and the mutation happen
    /// under the same entry lock, so two concurrent increments can
    /// never both pass the check against the same stale total.
    ///
    /// Returns the updated session on success; on `InsufficientBalance`
    /// nothing is mutated.
    pub fn try_increment_usage(&self, session_id: &SessionId, cost: Amount) -> Result<Session> {
        let mut entry = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::not_found(session_id))?;

        let available = entry.current_balance();
        if cost > available {
            return Err(SessionError::insufficient_balance(cost, available));
        }

        let new_total = entry
            .total_cost
            .checked_add(cost)
            .ok_or_else(|| SessionError::internal("total cost overflow"))?;
        entry.usage_count += 1;
        entry.total_cost = new_total;
        Ok(entry.value().clone())
    }

    /// Remove a session. Returns whether anything was removed; a miss
    /// is not an error.
    pub fn delete(&self, session_id: &SessionId) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, session)) => {
                self.by_participant.remove(&session.participant.normalized());
                self.total_closed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Removed session {}", session_id);
                true
            }
            None => false,
        }
    }

    /// Snapshot of every live session, for diagnostics.
    pub fn list(&self) -> Vec<Session> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            active_sessions: self.sessions.len(),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
        }
    }
}
