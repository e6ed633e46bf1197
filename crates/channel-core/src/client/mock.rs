//! In-memory transport for tests.
//!
//! Behaves like a well-functioning clearing node by default: hands out
//! session keys, assigns channel session ids, acks state updates, and
//! enforces the 2-of-2 quorum on close. Failure injection flags let
//! tests exercise every transport error path without a socket.

use crate::errors::{ChannelError, Result};
use crate::protocol::{RpcResponse, SignedEnvelope};
use crate::signing::{recover_signer, SessionKey};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MockChannelTransport {
    next_id: AtomicU64,
    next_channel_session: AtomicU64,
    /// Every envelope submitted, in order.
    sent: Mutex<Vec<SignedEnvelope>>,
    fail_connection: AtomicBool,
    fail_authentication: AtomicBool,
    omit_session_id: AtomicBool,
    fail_submit_state: AtomicBool,
    reject_close: AtomicBool,
}

impl MockChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `connect_and_authenticate` with `ConnectionFailed`.
    pub fn with_connection_failure(self) -> Self {
        self.fail_connection.store(true, Ordering::SeqCst);
        self
    }

    /// Fail `connect_and_authenticate` with `AuthenticationFailed`.
    pub fn with_authentication_failure(self) -> Self {
        self.fail_authentication.store(true, Ordering::SeqCst);
        self
    }

    /// Answer `open_session` without a channel session id.
    pub fn with_missing_session_id(self) -> Self {
        self.omit_session_id.store(true, Ordering::SeqCst);
        self
    }

    /// Fail `submit_state` with a transport error.
    pub fn with_submit_failure(self) -> Self {
        self.fail_submit_state.store(true, Ordering::SeqCst);
        self
    }

    /// Reject `close_session` envelopes outright.
    pub fn with_close_rejection(self) -> Self {
        self.reject_close.store(true, Ordering::SeqCst);
        self
    }

    fn record(&self, envelope: &SignedEnvelope) {
        self.sent.lock().unwrap().push(envelope.clone());
    }

    /// Envelopes submitted so far for the given method.
    pub fn submitted(&self, method: &str) -> Vec<SignedEnvelope> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.req.method == method)
            .cloned()
            .collect()
    }

    pub fn submission_count(&self, method: &str) -> usize {
        self.submitted(method).len()
    }

    fn ack(&self, envelope: &SignedEnvelope) -> RpcResponse {
        RpcResponse {
            request_id: envelope.req.request_id,
            method: envelope.req.method.clone(),
            params: serde_json::json!({"status": "ok"}),
            timestamp_ms: chrono::Utc::now().timestamp_millis() as u64,
        }
    }
}

#[async_trait]
impl super::ChannelTransport for MockChannelTransport {
    async fn connect_and_authenticate(
        &self,
        identity: &super::WalletIdentity,
    ) -> Result<SessionKey> {
        if self.fail_connection.load(Ordering::SeqCst) {
            return Err(ChannelError::ConnectionFailed(
                "mock transport refused connection".to_string(),
            ));
        }
        if self.fail_authentication.load(Ordering::SeqCst) {
            return Err(ChannelError::AuthenticationFailed(format!(
                "mock transport refused {}",
                identity.address
            )));
        }
        Ok(SessionKey::generate())
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn open_session(&self, envelope: &SignedEnvelope) -> Result<RpcResponse> {
        self.record(envelope);
        let mut response = self.ack(envelope);
        if !self.omit_session_id.load(Ordering::SeqCst) {
            let n = self.next_channel_session.fetch_add(1, Ordering::Relaxed) + 1;
            response.params = serde_json::json!({
                "app_session_id": format!("0x{:064x}", n),
            });
        }
        Ok(response)
    }

    async fn submit_state(&self, envelope: &SignedEnvelope) -> Result<RpcResponse> {
        if self.fail_submit_state.load(Ordering::SeqCst) {
            return Err(ChannelError::Transport(
                "mock transport dropped the state update".to_string(),
            ));
        }
        self.record(envelope);
        Ok(self.ack(envelope))
    }

    async fn close_session(&self, envelope: &SignedEnvelope) -> Result<RpcResponse> {
        if self.reject_close.load(Ordering::SeqCst) {
            return Err(ChannelError::rejected("mock transport rejected close"));
        }
        // Enforce the quorum the way the real node does: two signatures
        // from two distinct signers, both over this exact request.
        if envelope.sig.len() != 2 {
            return Err(ChannelError::rejected(format!(
                "close requires 2 signatures, got {}",
                envelope.sig.len()
            )));
        }
        let first = recover_signer(&envelope.req, &envelope.sig[0])?;
        let second = recover_signer(&envelope.req, &envelope.sig[1])?;
        if first.matches(&second) {
            return Err(ChannelError::rejected(
                "close signatures must come from distinct participants",
            ));
        }
        self.record(envelope);
        Ok(self.ack(envelope))
    }
}
