//! Lifecycle operations for SessionCoordinator: start, increment, end.

use crate::api::types::{SessionId, SettlementSplit, SettlementSummary, StartedSession, UsageReceipt};
use crate::errors::{Result, SessionError};
use crate::manager::events::SessionEvent;
use crate::session::Session;
use clearmeter_channel_core::client::WalletIdentity;
use clearmeter_channel_core::protocol::{
    close_app_session_params, create_app_session_params, submit_app_state_params, AllocationEntry,
    AppDefinition, Method, RpcPayload,
};
use clearmeter_channel_core::signing::{quorum_envelope, sign_envelope};
use clearmeter_channel_core::{Address, Amount};

use super::SessionCoordinator;

impl SessionCoordinator {
    /// Open a metered session for `participant` against the configured
    /// counterparty, funded with the configured initial allocation.
    ///
    /// All-or-nothing: the session enters the registry only after both
    /// participants authenticated and the clearing node returned a
    /// channel session id. A failure at any step leaves no partial
    /// session behind.
    pub async fn start_session(&self, participant: Address) -> Result<StartedSession> {
        let counterparty = self
            .config
            .counterparty
            .clone()
            .ok_or_else(|| SessionError::internal("no counterparty configured"))?;
        self.start_session_with_allocation(participant, counterparty, self.config.initial_allocation)
            .await
    }

    /// Like [`start_session`](Self::start_session) with an explicit cap.
    pub async fn start_session_with_allocation(
        &self,
        participant: Address,
        counterparty: Address,
        initial_allocation: Amount,
    ) -> Result<StartedSession> {
        // Fast duplicate check; the authoritative one happens at insert.
        if let Some(existing) = self.registry.get_by_participant(&participant) {
            tracing::warn!(
                "Participant {} already has session {}",
                participant,
                existing.session_id
            );
            return Err(SessionError::AlreadyActive {
                participant: participant.to_string(),
                existing_session_id: existing.session_id,
            });
        }

        // Authenticate both parties; each gets an ephemeral signing key
        // owned by this session alone.
        let participant_key = self
            .transport
            .connect_and_authenticate(&WalletIdentity::new(participant.clone()))
            .await?;
        let counterparty_key = self
            .transport
            .connect_and_authenticate(&WalletIdentity::new(counterparty.clone()))
            .await?;
        tracing::debug!(
            "Authenticated {} (key {}) and {} (key {})",
            participant,
            participant_key.address(),
            counterparty,
            counterparty_key.address()
        );

        let definition = AppDefinition::two_party(
            participant.clone(),
            counterparty.clone(),
            self.config.application.clone(),
        );
        let allocations = [
            AllocationEntry::new(participant.clone(), self.config.asset.clone(), initial_allocation),
            AllocationEntry::new(counterparty.clone(), self.config.asset.clone(), Amount::ZERO),
        ];

        // Opening needs only the participant's signature; quorum is for
        // the close.
        let payload = RpcPayload::new(
            self.transport.next_request_id(),
            Method::CreateAppSession,
            create_app_session_params(&definition, &allocations),
        );
        let envelope = sign_envelope(&participant_key, payload)?;
        let response = self.transport.open_session(&envelope).await?;

        let channel_session_id = response.channel_session_id().ok_or_else(|| {
            SessionError::protocol_violation("clearing node did not return a channel session id")
        })?;

        let session = Session::new(
            channel_session_id.clone(),
            participant.clone(),
            counterparty.clone(),
            participant_key,
            counterparty_key,
            initial_allocation,
        );
        let started = StartedSession {
            session_id: session.session_id.clone(),
            channel_session_id,
            participant,
            counterparty,
            initial_allocation: session.initial_allocation,
            started_at: session.started_at,
        };

        // A concurrent start for the same participant may have won the
        // race since the fast check; the insert is the atomic arbiter.
        self.registry.create(session)?;

        self.publish_event(SessionEvent::SessionOpened {
            session_id: started.session_id.clone(),
            channel_session_id: started.channel_session_id.clone(),
            participant: started.participant.clone(),
            counterparty: started.counterparty.clone(),
            initial_allocation: started.initial_allocation,
        })
        .await;

        Ok(started)
    }

    /// Apply one usage increment of the configured default cost.
    pub async fn increment_usage_default(&self, session_id: &SessionId) -> Result<UsageReceipt> {
        self.increment_usage(session_id, self.config.default_cost).await
    }

    /// Apply one usage increment of `cost` to a session.
    ///
    /// The balance cap is enforced strictly before any mutation: a
    /// rejected increment leaves `usage_count` and `total_cost` exactly
    /// as they were. After the increment is applied locally, the new
    /// allocation is restated to the clearing node under the
    /// participant's signature alone; local accounting stays
    /// authoritative if that submission fails.
    pub async fn increment_usage(&self, session_id: &SessionId, cost: Amount) -> Result<UsageReceipt> {
        let session = self.registry.get(session_id)?;

        // Gate on the balance cap before touching anything.
        let available = session.current_balance();
        if cost > available {
            self.publish_event(SessionEvent::BalanceRejected {
                session_id: session_id.clone(),
                requested: cost,
                available,
                shortfall: cost.saturating_sub(available),
            })
            .await;
            return Err(SessionError::insufficient_balance(cost, available));
        }

        // The registry re-runs the check inside the entry lock, so a
        // concurrent increment that spent the balance since our gate is
        // still rejected without mutating.
        let updated = match self.registry.try_increment_usage(session_id, cost) {
            Ok(updated) => updated,
            Err(SessionError::InsufficientBalance {
                requested,
                available,
                shortfall,
            }) => {
                self.publish_event(SessionEvent::BalanceRejected {
                    session_id: session_id.clone(),
                    requested,
                    available,
                    shortfall,
                })
                .await;
                return Err(SessionError::InsufficientBalance {
                    requested,
                    available,
                    shortfall,
                });
            }
            Err(other) => return Err(other),
        };

        let allocation = updated.split();
        self.publish_event(SessionEvent::UsageIncremented {
            session_id: session_id.clone(),
            usage_count: updated.usage_count,
            total_cost: updated.total_cost,
            allocation,
        })
        .await;

        // Restate the allocation to the clearing node. Interim updates
        // carry only the participant signature.
        let payload = RpcPayload::new(
            self.transport.next_request_id(),
            Method::SubmitAppState,
            submit_app_state_params(
                &updated.channel_session_id,
                &self.allocation_entries(&updated, allocation),
            ),
        );
        let envelope = sign_envelope(&updated.participant_key, payload)?;
        let state_synced = match self.transport.submit_state(&envelope).await {
            Ok(_) => true,
            Err(e) => {
                // Local accounting is authoritative; the next submission
                // restates the full allocation, so nothing is rolled
                // back here.
                tracing::warn!(
                    "State update for {} failed after local increment: {}",
                    session_id,
                    e
                );
                self.publish_event(SessionEvent::Warning {
                    session_id: Some(session_id.clone()),
                    message: format!("state update not acknowledged: {e}"),
                })
                .await;
                false
            }
        };
        self.publish_event(SessionEvent::StateSubmitted {
            session_id: session_id.clone(),
            synced: state_synced,
        })
        .await;

        Ok(UsageReceipt {
            session_id: session_id.clone(),
            usage_count: updated.usage_count,
            total_cost: updated.total_cost,
            remaining_balance: updated.current_balance(),
            allocation,
            state_synced,
        })
    }

    /// Close a session: settle the final split under the 2-of-2 quorum
    /// and remove the record.
    ///
    /// Registry removal is unconditional once the close envelope has
    /// gone out; a slow or ambiguous network response does not
    /// resurrect the session, since the close is idempotent on the
    /// clearing node's side. A second `end_session` for the same id
    /// fails with `NotFound`.
    pub async fn end_session(&self, session_id: &SessionId) -> Result<SettlementSummary> {
        let session = self.registry.get(session_id)?;

        let final_allocation = session.split();
        let payload = RpcPayload::new(
            self.transport.next_request_id(),
            Method::CloseAppSession,
            close_app_session_params(
                &session.channel_session_id,
                &self.allocation_entries(&session, final_allocation),
            ),
        );
        // Both participants sign the identical final-allocation request:
        // participant first, counterparty appended.
        let envelope = quorum_envelope(&session.participant_key, &session.counterparty_key, payload)?;

        let close_result = self.transport.close_session(&envelope).await;

        if !self.registry.delete(session_id) {
            tracing::debug!("Session {} was already removed", session_id);
        }

        if let Err(e) = close_result {
            tracing::warn!(
                "Close submission for {} failed; session removed locally anyway: {}",
                session_id,
                e
            );
            self.publish_event(SessionEvent::Warning {
                session_id: Some(session_id.clone()),
                message: format!("close submission failed: {e}"),
            })
            .await;
        }

        self.publish_event(SessionEvent::SessionClosed {
            session_id: session_id.clone(),
            channel_session_id: session.channel_session_id.clone(),
            usage_count: session.usage_count,
            total_cost: session.total_cost,
            final_allocation,
        })
        .await;

        Ok(SettlementSummary {
            session_id: session_id.clone(),
            channel_session_id: session.channel_session_id.clone(),
            usage_count: session.usage_count,
            total_cost: session.total_cost,
            duration: session.duration(),
            final_allocation,
        })
    }

    fn allocation_entries(
        &self,
        session: &Session,
        split: SettlementSplit,
    ) -> [AllocationEntry; 2] {
        [
            AllocationEntry::new(
                session.participant.clone(),
                self.config.asset.clone(),
                split.participant,
            ),
            AllocationEntry::new(
                session.counterparty.clone(),
                self.config.asset.clone(),
                split.counterparty,
            ),
        ]
    }
}
