//! Application-session message bodies.

use crate::amount::Amount;
use crate::types::{Address, ChannelSessionId};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The app definition submitted when a session opens. Two participants,
/// equal weights, 100% quorum: every state transition that requires
/// quorum needs both signatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDefinition {
    pub protocol: String,
    pub participants: Vec<Address>,
    pub weights: Vec<u8>,
    pub quorum: u8,
    pub challenge: u32,
    pub nonce: u64,
    pub application: String,
}

impl AppDefinition {
    /// The fixed two-party definition used by this stack.
    pub fn two_party(
        participant: Address,
        counterparty: Address,
        application: impl Into<String>,
    ) -> Self {
        AppDefinition {
            protocol: super::PROTOCOL_VERSION.to_string(),
            participants: vec![participant, counterparty],
            weights: vec![50, 50],
            quorum: 100,
            challenge: 0,
            nonce: chrono::Utc::now().timestamp_millis() as u64,
            application: application.into(),
        }
    }
}

/// One participant's allocation of the settlement asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub participant: Address,
    pub asset: String,
    pub amount: Amount,
}

impl AllocationEntry {
    pub fn new(participant: Address, asset: impl Into<String>, amount: Amount) -> Self {
        AllocationEntry {
            participant,
            asset: asset.into(),
            amount,
        }
    }
}

/// Params for `create_app_session`.
pub fn create_app_session_params(
    definition: &AppDefinition,
    allocations: &[AllocationEntry],
) -> serde_json::Value {
    json!({
        "definition": definition,
        "allocations": allocations,
    })
}

/// Params for `submit_app_state`.
pub fn submit_app_state_params(
    channel_session_id: &ChannelSessionId,
    allocations: &[AllocationEntry],
) -> serde_json::Value {
    json!({
        "app_session_id": channel_session_id,
        "allocations": allocations,
    })
}

/// Params for `close_app_session`. Same shape as a state submission; the
/// difference is entirely in the quorum the envelope must carry.
pub fn close_app_session_params(
    channel_session_id: &ChannelSessionId,
    allocations: &[AllocationEntry],
) -> serde_json::Value {
    json!({
        "app_session_id": channel_session_id,
        "allocations": allocations,
    })
}
