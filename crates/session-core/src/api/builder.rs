//! Coordinator configuration and builder.

use crate::coordinator::SessionCoordinator;
use crate::errors::Result;
use clearmeter_channel_core::client::{ChannelTransport, ClearNodeClient, ClearNodeConfig};
use clearmeter_channel_core::{Address, Amount};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the session coordinator.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// WebSocket endpoint of the clearing node.
    pub clearnode_url: String,
    /// Application identifier submitted in the session definition.
    pub application: String,
    /// Settlement asset for every allocation.
    pub asset: String,
    /// The earning counterparty every session settles against. Wallet
    /// custody for this address lives outside the stack; sessions only
    /// need where the spent allocation should end up.
    pub counterparty: Option<Address>,
    /// Initial allocation granted to the participant at session start;
    /// this is the spending cap for the whole session.
    pub initial_allocation: Amount,
    /// Cost applied when an increment does not specify one.
    pub default_cost: Amount,
    /// Ceiling on the authentication handshake.
    pub auth_timeout: Duration,
    /// Ceiling on a single request/response round trip.
    pub request_timeout: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        SessionManagerConfig {
            clearnode_url: "wss://clearnet-sandbox.yellow.com/ws".to_string(),
            application: "Clearmeter".to_string(),
            asset: "ytest.usd".to_string(),
            counterparty: None,
            initial_allocation: Amount::from_micro_units(10_000), // 0.01
            default_cost: Amount::from_micro_units(1_000),        // 0.001
            auth_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Builder for [`SessionCoordinator`].
#[derive(Debug, Clone, Default)]
pub struct SessionManagerBuilder {
    config: SessionManagerConfig,
}

impl SessionManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clearnode_url(mut self, url: impl Into<String>) -> Self {
        self.config.clearnode_url = url.into();
        self
    }

    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.config.application = application.into();
        self
    }

    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.config.asset = asset.into();
        self
    }

    pub fn with_counterparty(mut self, counterparty: Address) -> Self {
        self.config.counterparty = Some(counterparty);
        self
    }

    pub fn with_initial_allocation(mut self, amount: Amount) -> Self {
        self.config.initial_allocation = amount;
        self
    }

    pub fn with_default_cost(mut self, amount: Amount) -> Self {
        self.config.default_cost = amount;
        self
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.config.auth_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build a coordinator backed by a WebSocket clearing-node client.
    pub async fn build(self) -> Result<Arc<SessionCoordinator>> {
        let transport = Arc::new(ClearNodeClient::new(ClearNodeConfig {
            url: self.config.clearnode_url.clone(),
            application: self.config.application.clone(),
            allowance_asset: self.config.asset.clone(),
            auth_timeout: self.config.auth_timeout,
            request_timeout: self.config.request_timeout,
            ..ClearNodeConfig::default()
        }));
        self.build_with_transport(transport).await
    }

    /// Build a coordinator on an injected transport. Tests use this with
    /// the mock; production code can use it to share one client across
    /// coordinators.
    pub async fn build_with_transport(
        self,
        transport: Arc<dyn ChannelTransport>,
    ) -> Result<Arc<SessionCoordinator>> {
        SessionCoordinator::new(self.config, transport).await
    }
}
