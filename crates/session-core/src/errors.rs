//! Error types for session operations.
//!
//! A closed taxonomy: validation failures (`NotFound`, `AlreadyActive`,
//! `InsufficientBalance`) are expected outcomes the caller can act on
//! and carry the structured fields needed to do so; transport failures
//! surface as failures of the enclosing operation and are never retried
//! here.

use crate::api::types::SessionId;
use clearmeter_channel_core::{Amount, ChannelError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {session_id}")]
    NotFound { session_id: String },

    #[error("Participant {participant} already has an active session ({existing_session_id})")]
    AlreadyActive {
        participant: String,
        existing_session_id: SessionId,
    },

    #[error("Insufficient balance: requested {requested}, available {available} (short {shortfall})")]
    InsufficientBalance {
        requested: Amount,
        available: Amount,
        shortfall: Amount,
    },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Request rejected by clearing node: {reason}")]
    Rejected { reason: String },

    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SessionError {
    pub fn not_found(session_id: &SessionId) -> Self {
        SessionError::NotFound {
            session_id: session_id.to_string(),
        }
    }

    pub fn insufficient_balance(requested: Amount, available: Amount) -> Self {
        SessionError::InsufficientBalance {
            requested,
            available,
            shortfall: requested.saturating_sub(available),
        }
    }

    pub fn protocol_violation(message: impl Into<String>) -> Self {
        SessionError::ProtocolViolation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SessionError::Internal {
            message: message.into(),
        }
    }
}

impl From<ChannelError> for SessionError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::ConnectionFailed(message) => SessionError::ConnectionFailed { message },
            ChannelError::AuthenticationFailed(message) => {
                SessionError::AuthenticationFailed { message }
            }
            ChannelError::Timeout { operation } => SessionError::Timeout { operation },
            ChannelError::Rejected { reason } => SessionError::Rejected { reason },
            ChannelError::Protocol(message) => SessionError::ProtocolViolation { message },
            ChannelError::Transport(message) => SessionError::ConnectionFailed { message },
            ChannelError::Signing(message)
            | ChannelError::InvalidAddress(message)
            | ChannelError::InvalidAmount(message) => SessionError::Internal { message },
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
