//! Transport contract with the clearing node.
//!
//! The session layer never talks to a socket directly: everything goes
//! through [`ChannelTransport`], implemented by the WebSocket
//! [`ClearNodeClient`] for real deployments and by
//! [`MockChannelTransport`] in tests.

mod clearnode;
mod mock;

pub use clearnode::{ClearNodeClient, ClearNodeConfig};
pub use mock::MockChannelTransport;

use crate::errors::Result;
use crate::protocol::{RpcResponse, SignedEnvelope};
use crate::signing::SessionKey;
use crate::types::Address;
use async_trait::async_trait;

/// The wallet identity of a participant, as far as this layer cares:
/// an address. Wallet connection and proof-of-ownership live outside
/// this stack.
#[derive(Debug, Clone)]
pub struct WalletIdentity {
    pub address: Address,
}

impl WalletIdentity {
    pub fn new(address: Address) -> Self {
        WalletIdentity { address }
    }
}

/// Operations the session layer needs from a clearing node.
///
/// Implementations own connection management and timeouts; every method
/// returns within a bounded time. `open_session` and `close_session`
/// must never be retried internally (a replayed open can mint a
/// duplicate channel session); `submit_state` is safe to retry since it
/// only restates the current allocation.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Connect if necessary and authenticate a participant, returning
    /// the ephemeral session key the node will accept signatures from.
    async fn connect_and_authenticate(&self, identity: &WalletIdentity) -> Result<SessionKey>;

    /// Allocate a request id for the next payload.
    fn next_request_id(&self) -> u64;

    /// Submit an open-session envelope (participant signature only).
    async fn open_session(&self, envelope: &SignedEnvelope) -> Result<RpcResponse>;

    /// Submit an interim state-update envelope (participant signature only).
    async fn submit_state(&self, envelope: &SignedEnvelope) -> Result<RpcResponse>;

    /// Submit a fully quorum-signed close envelope.
    async fn close_session(&self, envelope: &SignedEnvelope) -> Result<RpcResponse>;
}
