//! Core SessionCoordinator structure and initialization

use crate::api::builder::SessionManagerConfig;
use crate::api::types::{SessionSnapshot, SessionStats};
use crate::errors::Result;
use crate::manager::events::{SessionEvent, SessionEventProcessor, SessionEventSubscriber};
use crate::coordinator::registry::SessionRegistry;
use clearmeter_channel_core::client::ChannelTransport;
use std::sync::Arc;

/// The coordinator for the session system: owns the registry, the
/// transport handle and the event processor, and exposes the three
/// lifecycle operations (`start_session`, `increment_usage`,
/// `end_session`, in `session_ops`).
///
/// Constructed once at process start and passed around by handle; there
/// is no ambient global state. The coordinator itself is stateless
/// between calls: every operation fetches from the registry, mutates
/// through it, and drops its local copy.
pub struct SessionCoordinator {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) transport: Arc<dyn ChannelTransport>,
    pub(crate) event_processor: Arc<SessionEventProcessor>,
    pub(crate) config: SessionManagerConfig,
}

impl SessionCoordinator {
    /// Create and initialize the coordinator.
    pub async fn new(
        config: SessionManagerConfig,
        transport: Arc<dyn ChannelTransport>,
    ) -> Result<Arc<Self>> {
        let coordinator = Arc::new(Self {
            registry: Arc::new(SessionRegistry::new()),
            transport,
            event_processor: Arc::new(SessionEventProcessor::new()),
            config,
        });
        coordinator.event_processor.start().await?;
        tracing::info!(
            "SessionCoordinator initialized (application {})",
            coordinator.config.application
        );
        Ok(coordinator)
    }

    /// Stop the event processor. Live sessions stay in the registry;
    /// closing them remains the caller's decision.
    pub async fn stop(&self) -> Result<()> {
        self.event_processor.stop().await?;
        tracing::info!("SessionCoordinator stopped");
        Ok(())
    }

    /// Subscribe to lifecycle events.
    pub async fn subscribe(&self) -> Result<SessionEventSubscriber> {
        self.event_processor.subscribe().await
    }

    pub(crate) async fn publish_event(&self, event: SessionEvent) {
        // Event delivery is observability, not control flow: a publish
        // failure must never fail the operation that emitted it.
        if let Err(e) = self.event_processor.publish(event).await {
            tracing::debug!("Event publish failed: {}", e);
        }
    }

    /// Read-only view of every live session.
    pub fn list_sessions(&self) -> Vec<SessionSnapshot> {
        self.registry.list().iter().map(|s| s.snapshot()).collect()
    }

    /// Aggregate registry statistics.
    pub fn stats(&self) -> SessionStats {
        self.registry.stats()
    }

    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("config", &self.config)
            .field("stats", &self.registry.stats())
            .finish()
    }
}
