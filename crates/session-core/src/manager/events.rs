//! Session Event System
//!
//! Lifecycle milestones are published as typed events on a
//! `tokio::sync::broadcast` channel, decoupled from control flow:
//! nothing in the session lifecycle depends on whether anyone is
//! listening, and tests assert on events rather than log output.

use crate::api::types::{SessionId, SettlementSplit};
use clearmeter_channel_core::{Address, Amount, ChannelSessionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Session events published through the event system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A session opened on the clearing node and entered the registry.
    SessionOpened {
        session_id: SessionId,
        channel_session_id: ChannelSessionId,
        participant: Address,
        counterparty: Address,
        initial_allocation: SettlementSplit,
    },

    /// A usage increment was accepted and applied.
    UsageIncremented {
        session_id: SessionId,
        usage_count: u64,
        total_cost: Amount,
        allocation: SettlementSplit,
    },

    /// A usage increment was rejected by the balance cap. No state
    /// changed.
    BalanceRejected {
        session_id: SessionId,
        requested: Amount,
        available: Amount,
        shortfall: Amount,
    },

    /// An interim state update reached (or failed to reach) the
    /// clearing node.
    StateSubmitted {
        session_id: SessionId,
        synced: bool,
    },

    /// A session closed and left the registry.
    SessionClosed {
        session_id: SessionId,
        channel_session_id: ChannelSessionId,
        usage_count: u64,
        total_cost: Amount,
        final_allocation: SettlementSplit,
    },

    /// Non-fatal condition worth surfacing.
    Warning {
        session_id: Option<SessionId>,
        message: String,
    },

    /// Error surfaced through the event stream.
    Error {
        session_id: Option<SessionId>,
        error: String,
    },
}

/// Subscriber handle for session events.
pub struct SessionEventSubscriber {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl SessionEventSubscriber {
    pub fn new(receiver: broadcast::Receiver<SessionEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event.
    pub async fn receive(&mut self) -> crate::errors::Result<SessionEvent> {
        self.receiver
            .recv()
            .await
            .map_err(|e| crate::errors::SessionError::internal(format!("event stream closed: {e}")))
    }

    /// Receive without blocking; `None` when no event is waiting.
    pub fn try_receive(&mut self) -> crate::errors::Result<Option<SessionEvent>> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(e) => Err(crate::errors::SessionError::internal(format!(
                "event receive failed: {e}"
            ))),
        }
    }
}

/// Broadcast-based event processor.
pub struct SessionEventProcessor {
    sender: Arc<RwLock<Option<broadcast::Sender<SessionEvent>>>>,
}

impl std::fmt::Debug for SessionEventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEventProcessor")
            .field(
                "running",
                &self.sender.try_read().map(|s| s.is_some()).unwrap_or(false),
            )
            .finish()
    }
}

impl SessionEventProcessor {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn start(&self) -> crate::errors::Result<()> {
        let (sender, _) = broadcast::channel(1000);
        *self.sender.write().await = Some(sender);
        tracing::debug!("Session event processor started");
        Ok(())
    }

    pub async fn stop(&self) -> crate::errors::Result<()> {
        *self.sender.write().await = None;
        tracing::debug!("Session event processor stopped");
        Ok(())
    }

    /// Publish an event. Absence of subscribers is not an error; an
    /// inactive processor drops the event with a debug note.
    pub async fn publish(&self, event: SessionEvent) -> crate::errors::Result<()> {
        let guard = self.sender.read().await;
        match guard.as_ref() {
            Some(sender) => {
                match &event {
                    SessionEvent::SessionOpened {
                        session_id,
                        channel_session_id,
                        participant,
                        ..
                    } => tracing::info!(
                        "Session {} opened on channel {} for {}",
                        session_id,
                        channel_session_id,
                        participant
                    ),
                    SessionEvent::BalanceRejected {
                        session_id,
                        requested,
                        available,
                        ..
                    } => tracing::warn!(
                        "Balance cap rejected increment on {}: requested {}, available {}",
                        session_id,
                        requested,
                        available
                    ),
                    SessionEvent::SessionClosed {
                        session_id,
                        total_cost,
                        usage_count,
                        ..
                    } => tracing::info!(
                        "Session {} closed after {} uses, total cost {}",
                        session_id,
                        usage_count,
                        total_cost
                    ),
                    SessionEvent::Warning { message, .. } => tracing::warn!("{}", message),
                    _ => {}
                }
                if sender.send(event).is_err() {
                    tracing::debug!("No subscribers for session event");
                }
                Ok(())
            }
            None => {
                tracing::debug!("Event processor not running, dropping event");
                Ok(())
            }
        }
    }

    pub async fn subscribe(&self) -> crate::errors::Result<SessionEventSubscriber> {
        let guard = self.sender.read().await;
        guard
            .as_ref()
            .map(|sender| SessionEventSubscriber::new(sender.subscribe()))
            .ok_or_else(|| crate::errors::SessionError::internal("event processor not running"))
    }
}

impl Default for SessionEventProcessor {
    fn default() -> Self {
        Self::new()
    }
}
