//! Top-level real-time engine that ties the gateway subsystems together.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use chathub_auth::SessionManager;
use chathub_core::config::RealtimeConfig;
use chathub_core::events::DomainEvent;
use chathub_core::result::AppResult;
use chathub_core::traits::{ChatDirectory, EventLog};

use crate::connection::{CloseReason, ConnectionDriver, ConnectionRegistry};
use crate::fanout::FanoutEngine;
use crate::metrics::{MetricsSnapshot, RealtimeMetrics};
use crate::presence::PresenceTracker;

/// Central real-time engine shared by the HTTP layer.
#[derive(Debug, Clone)]
pub struct RealtimeEngine {
    /// Connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Event fan-out.
    pub fanout: Arc<FanoutEngine>,
    /// Presence tracker.
    pub presence: Arc<PresenceTracker>,
    /// Connection driver.
    pub driver: Arc<ConnectionDriver>,
    /// Metrics collector.
    pub metrics: Arc<RealtimeMetrics>,
}

impl RealtimeEngine {
    /// Spawn the registry shards, fan-out workers, and presence tracker,
    /// and subscribe the registry to session revocations.
    pub async fn start(
        config: &RealtimeConfig,
        sessions: Arc<SessionManager>,
        chats: Arc<dyn ChatDirectory>,
        events: Arc<dyn EventLog>,
    ) -> Self {
        let metrics = Arc::new(RealtimeMetrics::new());
        let (presence_tx, presence_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(ConnectionRegistry::new(config, presence_tx, Arc::clone(&metrics)));
        let fanout = Arc::new(FanoutEngine::new(config, Arc::clone(&registry), Arc::clone(&metrics)));
        let presence = Arc::new(PresenceTracker::new(
            config,
            Arc::clone(&registry),
            Arc::clone(&fanout),
        ));
        presence.spawn(presence_rx);

        sessions.subscribe(registry.clone()).await;

        let driver = Arc::new(ConnectionDriver::new(
            config,
            sessions,
            Arc::clone(&registry),
            Arc::clone(&fanout),
            Arc::clone(&presence),
            chats,
            events,
            Arc::clone(&metrics),
        ));

        info!(
            shards = config.registry_shards,
            workers = config.fanout_workers,
            "Real-time engine initialized"
        );

        Self {
            registry,
            fanout,
            presence,
            driver,
            metrics,
        }
    }

    /// Publish a committed domain event to live connections.
    pub async fn publish(&self, event: DomainEvent) -> AppResult<()> {
        self.fanout.publish(event).await
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Close every connection with `ServerShutdown`.
    pub async fn shutdown(&self) -> usize {
        info!("Shutting down real-time engine");
        self.fanout.flush().await;
        let closed = self.registry.close_all(CloseReason::ServerShutdown).await;
        info!(closed, "Real-time engine shut down");
        closed
    }
}
