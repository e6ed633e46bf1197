//! Error types for clearing-node operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Request rejected by clearing node: {reason}")]
    Rejected { reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl ChannelError {
    pub fn timeout(operation: impl Into<String>) -> Self {
        ChannelError::Timeout {
            operation: operation.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        ChannelError::Rejected {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
