//! WebSocket client for a clearing node.
//!
//! One connection per client, established lazily. A background read
//! task parses every frame and routes it either to the request that is
//! waiting on that id or, for unsolicited frames (the auth challenge),
//! to the event stream the authentication handshake listens on.

use crate::amount::Amount;
use crate::client::ChannelTransport;
use crate::errors::{ChannelError, Result};
use crate::protocol::{Method, RpcPayload, RpcResponse, SignedEnvelope};
use crate::signing::SessionKey;
use crate::types::Address;
use async_trait::async_trait;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcResponse>>>>;

/// Connection settings for a clearing node.
#[derive(Debug, Clone)]
pub struct ClearNodeConfig {
    /// WebSocket endpoint of the node.
    pub url: String,
    /// Application name presented during authentication.
    pub application: String,
    /// Scope requested for the session key.
    pub scope: String,
    /// Asset covered by the authentication allowance.
    pub allowance_asset: String,
    /// Spending allowance granted to the session key.
    pub allowance_amount: Amount,
    /// Ceiling on the whole authentication handshake.
    pub auth_timeout: Duration,
    /// Ceiling on a single request/response round trip.
    pub request_timeout: Duration,
    /// Session-key lifetime requested from the node.
    pub session_key_ttl: Duration,
}

impl Default for ClearNodeConfig {
    fn default() -> Self {
        ClearNodeConfig {
            url: "wss://clearnet-sandbox.yellow.com/ws".to_string(),
            application: "Clearmeter".to_string(),
            scope: "clearmeter.app".to_string(),
            allowance_asset: "ytest.usd".to_string(),
            allowance_amount: Amount::from_micro_units(1_000_000),
            auth_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(15),
            session_key_ttl: Duration::from_secs(3600),
        }
    }
}

struct Connection {
    sink: WsSink,
    /// Frames that matched no pending request (auth challenges, server
    /// notifications) end up here.
    events: mpsc::UnboundedReceiver<RpcResponse>,
}

/// WebSocket implementation of [`crate::client::ChannelTransport`].
pub struct ClearNodeClient {
    config: ClearNodeConfig,
    connection: Mutex<Option<Connection>>,
    pending: PendingMap,
    next_id: AtomicU64,
}

impl ClearNodeClient {
    pub fn new(config: ClearNodeConfig) -> Self {
        ClearNodeClient {
            config,
            connection: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ClearNodeConfig {
        &self.config
    }

    /// Establish the WebSocket connection and start the read task.
    async fn ensure_connected(&self) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        info!("Connecting to clearing node at {}", self.config.url);
        let (stream, _) = connect_async(self.config.url.as_str())
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        let (sink, mut read) = stream.split();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending = self.pending.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => match RpcResponse::from_wire(&text) {
                        Ok(response) => {
                            let waiter = pending.lock().await.remove(&response.request_id);
                            match waiter {
                                Some(tx) => {
                                    let _ = tx.send(response);
                                }
                                None => {
                                    let _ = events_tx.send(response);
                                }
                            }
                        }
                        Err(e) => debug!("Discarding unparseable frame: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Clearing node closed the connection");
                        break;
                    }
                    Ok(_) => {} // ping/pong/binary: nothing to route
                    Err(e) => {
                        warn!("WebSocket read error: {}", e);
                        break;
                    }
                }
            }
            // Dropping the pending map entries wakes every waiter with a
            // closed-channel error.
            pending.lock().await.clear();
        });

        *guard = Some(Connection {
            sink,
            events: events_rx,
        });
        info!("Connected to clearing node");
        Ok(())
    }

    /// Send an envelope and await the response carrying its request id.
    async fn send_and_wait(&self, envelope: &SignedEnvelope, operation: &str) -> Result<RpcResponse> {
        self.ensure_connected().await?;

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(envelope.req.request_id, tx);

        {
            let mut guard = self.connection.lock().await;
            let connection = guard
                .as_mut()
                .ok_or_else(|| ChannelError::ConnectionFailed("not connected".to_string()))?;
            connection
                .sink
                .send(Message::Text(envelope.to_wire()?))
                .await
                .map_err(|e| ChannelError::Transport(e.to_string()))?;
        }

        let response = match timeout(self.config.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(ChannelError::ConnectionFailed(
                    "connection lost while awaiting response".to_string(),
                ))
            }
            Err(_) => {
                self.pending.lock().await.remove(&envelope.req.request_id);
                return Err(ChannelError::timeout(operation));
            }
        };

        if response.is_error() {
            return Err(ChannelError::rejected(response.error_message()));
        }
        Ok(response)
    }

    /// Await the next unsolicited frame with the given method.
    async fn wait_for_event(&self, method: &str) -> Result<RpcResponse> {
        loop {
            let mut guard = self.connection.lock().await;
            let connection = guard
                .as_mut()
                .ok_or_else(|| ChannelError::ConnectionFailed("not connected".to_string()))?;
            match connection.events.recv().await {
                Some(response) if response.method == method => return Ok(response),
                Some(response) if response.is_error() => {
                    return Err(ChannelError::AuthenticationFailed(response.error_message()))
                }
                Some(other) => debug!("Ignoring frame while waiting for {}: {}", method, other.method),
                None => {
                    return Err(ChannelError::ConnectionFailed(
                        "connection lost during handshake".to_string(),
                    ))
                }
            }
        }
    }

    /// The auth handshake: request, challenge, verify, confirmation.
    async fn authenticate(&self, address: &Address) -> Result<SessionKey> {
        let key = SessionKey::generate();
        let expires_at =
            chrono::Utc::now().timestamp() as u64 + self.config.session_key_ttl.as_secs();

        let auth_request = RpcPayload::new(
            self.next_request_id(),
            Method::AuthRequest,
            json!({
                "address": address,
                "session_key": key.address(),
                "application": self.config.application,
                "scope": self.config.scope,
                "allowances": [{
                    "asset": self.config.allowance_asset,
                    "amount": self.config.allowance_amount,
                }],
                "expires_at": expires_at,
            }),
        );
        // The request itself carries no signature; the proof happens in
        // the verify step.
        let envelope = SignedEnvelope {
            req: auth_request,
            sig: Vec::new(),
        };
        {
            let mut guard = self.connection.lock().await;
            let connection = guard
                .as_mut()
                .ok_or_else(|| ChannelError::ConnectionFailed("not connected".to_string()))?;
            connection
                .sink
                .send(Message::Text(envelope.to_wire()?))
                .await
                .map_err(|e| ChannelError::Transport(e.to_string()))?;
        }
        debug!("Auth request sent for {}", address);

        let challenge = self.wait_for_event(Method::AuthChallenge.as_str()).await?;
        let challenge_token = challenge
            .params
            .get("challenge_message")
            .or_else(|| challenge.params.get("challengeMessage"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ChannelError::Protocol("auth challenge without challenge message".to_string())
            })?;

        let verify = RpcPayload::new(
            self.next_request_id(),
            Method::AuthVerify,
            json!({ "challenge": challenge_token }),
        );
        let verify_envelope = crate::signing::sign_envelope(&key, verify)?;
        let response = self.send_and_wait(&verify_envelope, "auth_verify").await?;

        let authenticated = response
            .params
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(response.method == Method::AuthVerify.as_str());
        if !authenticated {
            return Err(ChannelError::AuthenticationFailed(
                "clearing node refused the session key".to_string(),
            ));
        }

        info!("Authenticated {} with session key {}", address, key.address());
        Ok(key)
    }
}

#[async_trait]
impl super::ChannelTransport for ClearNodeClient {
    async fn connect_and_authenticate(&self, identity: &super::WalletIdentity) -> Result<SessionKey> {
        self.ensure_connected().await?;
        match timeout(self.config.auth_timeout, self.authenticate(&identity.address)).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::timeout("authenticate")),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn open_session(&self, envelope: &SignedEnvelope) -> Result<RpcResponse> {
        self.send_and_wait(envelope, "open_session").await
    }

    async fn submit_state(&self, envelope: &SignedEnvelope) -> Result<RpcResponse> {
        self.send_and_wait(envelope, "submit_state").await
    }

    async fn close_session(&self, envelope: &SignedEnvelope) -> Result<RpcResponse> {
        self.send_and_wait(envelope, "close_session").await
    }
}
