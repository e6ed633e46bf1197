//! Clearing-node protocol layer.
//!
//! This crate speaks the wire protocol of an off-chain state-channel
//! clearing node: fixed-precision settlement amounts, participant
//! addresses, RPC payloads and signed envelopes, ephemeral session-key
//! signing (including 2-of-2 quorum envelope assembly), and the
//! [`ChannelTransport`] contract with a WebSocket implementation and an
//! in-memory mock for tests.
//!
//! The session layer (`clearmeter-session-core`) sits on top of this
//! crate the same way a call-control layer sits on top of its signaling
//! protocol: everything here is session-agnostic and carries no
//! accounting state.

pub mod amount;
pub mod client;
pub mod errors;
pub mod protocol;
pub mod signing;
pub mod types;

pub use amount::Amount;
pub use client::{ChannelTransport, ClearNodeClient, ClearNodeConfig, MockChannelTransport, WalletIdentity};
pub use errors::{ChannelError, Result};
pub use protocol::{
    AllocationEntry, AppDefinition, Method, RpcPayload, RpcResponse, SignedEnvelope,
    PROTOCOL_VERSION,
};
pub use signing::{quorum_envelope, sign_envelope, SessionKey};
pub use types::{Address, ChannelSessionId};
