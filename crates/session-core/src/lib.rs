//! Session coordination layer for metered two-party payment channels.
//!
//! A session is one metered payment channel instance: it opens with an
//! initial allocation that caps what the participant can spend, accrues
//! cost one usage increment at a time, and closes with a settlement
//! split both parties sign. This crate owns the session lifecycle
//! (registry, allocation accounting, balance-cap enforcement, and the
//! quorum close handshake) on top of the protocol primitives in
//! `clearmeter-channel-core`.
//!
//! Entry point is [`SessionCoordinator`], usually constructed through
//! [`api::builder::SessionManagerBuilder`]:
//!
//! ```no_run
//! use clearmeter_session_core::api::builder::SessionManagerBuilder;
//! use clearmeter_channel_core::Address;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let counterparty = Address::parse("0xd3a5Bef2b345CF3A4Ad40a00B56bbA5B4e4e4c7b")?;
//! let coordinator = SessionManagerBuilder::new()
//!     .with_clearnode_url("wss://clearnet-sandbox.yellow.com/ws")
//!     .with_counterparty(counterparty)
//!     .with_initial_allocation("0.01".parse()?)
//!     .build()
//!     .await?;
//!
//! let participant = Address::parse("0x36518CC3e9ba6Cdd5b8c2e51b5fCd60271AC2c1b")?;
//! let started = coordinator.start_session(participant).await?;
//! let receipt = coordinator
//!     .increment_usage(&started.session_id, "0.001".parse()?)
//!     .await?;
//! let summary = coordinator.end_session(&started.session_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod allocation;
pub mod api;
pub mod coordinator;
pub mod errors;
pub mod manager;
pub mod session;

pub use api::types::{
    SessionId, SessionSnapshot, SessionStats, SettlementSplit, SettlementSummary, StartedSession,
    UsageReceipt,
};
pub use coordinator::{SessionCoordinator, SessionRegistry};
pub use errors::{Result, SessionError};
pub use manager::events::{SessionEvent, SessionEventProcessor, SessionEventSubscriber};

/// Commonly used imports for consumers of this crate.
pub mod prelude {
    pub use crate::api::builder::{SessionManagerBuilder, SessionManagerConfig};
    pub use crate::api::types::*;
    pub use crate::coordinator::SessionCoordinator;
    pub use crate::errors::{Result, SessionError};
    pub use crate::manager::events::SessionEvent;
    pub use clearmeter_channel_core::{Address, Amount, ChannelSessionId};
}
