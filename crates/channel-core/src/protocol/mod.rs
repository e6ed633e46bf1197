//! Wire protocol types for the clearing node.
//!
//! Requests travel as a signed envelope `{"req": [...], "sig": [...]}`
//! where `req` is the positional array `[request_id, method, params,
//! timestamp_ms]`. The canonical JSON bytes of that array are what every
//! signature covers; a quorum message is the same `req` with one
//! signature per required participant appended. Responses come back as
//! `{"res": [...], "sig": [...]}` with the same positional layout.

mod messages;

pub use messages::{
    close_app_session_params, create_app_session_params, submit_app_state_params, AllocationEntry,
    AppDefinition,
};

use crate::errors::ChannelError;
use crate::types::ChannelSessionId;
use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Protocol revision spoken with the clearing node.
pub const PROTOCOL_VERSION: &str = "NitroRPC/0.4";

/// RPC methods used by this stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    AuthRequest,
    AuthChallenge,
    AuthVerify,
    CreateAppSession,
    SubmitAppState,
    CloseAppSession,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::AuthRequest => "auth_request",
            Method::AuthChallenge => "auth_challenge",
            Method::AuthVerify => "auth_verify",
            Method::CreateAppSession => "create_app_session",
            Method::SubmitAppState => "submit_app_state",
            Method::CloseAppSession => "close_app_session",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unsigned request payload: `[request_id, method, params, timestamp_ms]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcPayload {
    pub request_id: u64,
    pub method: String,
    pub params: serde_json::Value,
    pub timestamp_ms: u64,
}

impl RpcPayload {
    /// Build a payload stamped with the current wall-clock time.
    pub fn new(request_id: u64, method: Method, params: serde_json::Value) -> Self {
        RpcPayload {
            request_id,
            method: method.as_str().to_string(),
            params,
            timestamp_ms: chrono::Utc::now().timestamp_millis() as u64,
        }
    }

    /// The canonical bytes covered by every signature over this payload.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, ChannelError> {
        serde_json::to_vec(self).map_err(|e| ChannelError::Protocol(e.to_string()))
    }
}

impl Serialize for RpcPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(4))?;
        seq.serialize_element(&self.request_id)?;
        seq.serialize_element(&self.method)?;
        seq.serialize_element(&self.params)?;
        seq.serialize_element(&self.timestamp_ms)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for RpcPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PayloadVisitor;

        impl<'de> Visitor<'de> for PayloadVisitor {
            type Value = RpcPayload;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array [request_id, method, params, timestamp_ms]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RpcPayload, A::Error> {
                let request_id = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
                let method = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(1, &self))?;
                let params = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(2, &self))?;
                let timestamp_ms = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(3, &self))?;
                Ok(RpcPayload {
                    request_id,
                    method,
                    params,
                    timestamp_ms,
                })
            }
        }

        deserializer.deserialize_seq(PayloadVisitor)
    }
}

/// A request payload plus the signatures covering it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub req: RpcPayload,
    pub sig: Vec<String>,
}

impl SignedEnvelope {
    pub fn to_wire(&self) -> Result<String, ChannelError> {
        serde_json::to_string(self).map_err(|e| ChannelError::Protocol(e.to_string()))
    }
}

/// A parsed response from the clearing node.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    pub request_id: u64,
    pub method: String,
    pub params: serde_json::Value,
    pub timestamp_ms: u64,
}

#[derive(Deserialize)]
struct WireResponse {
    res: RpcPayload,
    #[serde(default)]
    #[allow(dead_code)]
    sig: Vec<String>,
}

impl RpcResponse {
    /// Parse a raw frame from the clearing node.
    pub fn from_wire(text: &str) -> Result<Self, ChannelError> {
        let wire: WireResponse = serde_json::from_str(text)
            .map_err(|e| ChannelError::Protocol(format!("malformed response frame: {}", e)))?;
        Ok(RpcResponse {
            request_id: wire.res.request_id,
            method: wire.res.method,
            params: wire.res.params,
            timestamp_ms: wire.res.timestamp_ms,
        })
    }

    /// The channel-assigned session id, if this response carries one.
    ///
    /// The node has been observed to use both snake and camel case here,
    /// so accept either.
    pub fn channel_session_id(&self) -> Option<ChannelSessionId> {
        self.params
            .get("app_session_id")
            .or_else(|| self.params.get("appSessionId"))
            .and_then(|v| v.as_str())
            .map(|s| ChannelSessionId(s.to_string()))
    }

    pub fn is_error(&self) -> bool {
        self.method == "error"
    }

    pub fn error_message(&self) -> String {
        self.params
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unspecified error")
            .to_string()
    }
}
