//! Gateway counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic counters shared by the registry, fan-out engine, and driver.
#[derive(Debug, Default)]
pub struct RealtimeMetrics {
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    handshakes_rejected: AtomicU64,
    events_published: AtomicU64,
    events_delivered: AtomicU64,
    events_dropped: AtomicU64,
    stale_events: AtomicU64,
    slow_consumer_closes: AtomicU64,
    resync_closes: AtomicU64,
    evictions: AtomicU64,
    reorder_gates: AtomicU64,
}

impl RealtimeMetrics {
    /// Create zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection completed its handshake.
    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// An admitted connection was released.
    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// A handshake failed or timed out.
    pub fn handshake_rejected(&self) {
        self.handshakes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// An event entered the fan-out engine.
    pub fn event_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// An event was queued for one connection.
    pub fn event_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// A non-critical event was shed under backpressure.
    pub fn event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// A sequenced event arrived already delivered or too late to deliver.
    pub fn stale_event(&self) {
        self.stale_events.fetch_add(1, Ordering::Relaxed);
    }

    /// A connection was closed for falling behind on critical events.
    pub fn slow_consumer_closed(&self) {
        self.slow_consumer_closes.fetch_add(1, Ordering::Relaxed);
    }

    /// Connections closed because a chat they joined lost a sequenced event.
    pub fn resync_closed(&self, count: usize) {
        self.resync_closes.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// A chat got a reorder gate.
    pub fn gate_opened(&self) {
        self.reorder_gates.fetch_add(1, Ordering::Relaxed);
    }

    /// Idle reorder gates were dropped.
    pub fn gates_dropped(&self, count: usize) {
        self.reorder_gates.fetch_sub(count as u64, Ordering::Relaxed);
    }

    /// Connections closed because their session was revoked.
    pub fn evicted(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let opened = self.connections_opened.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);
        MetricsSnapshot {
            connections_opened: opened,
            connections_closed: closed,
            connections_active: opened.saturating_sub(closed),
            handshakes_rejected: self.handshakes_rejected.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            stale_events: self.stale_events.load(Ordering::Relaxed),
            slow_consumer_closes: self.slow_consumer_closes.load(Ordering::Relaxed),
            resync_closes: self.resync_closes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            reorder_gates: self.reorder_gates.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Connections that completed a handshake.
    pub connections_opened: u64,
    /// Admitted connections since released.
    pub connections_closed: u64,
    /// Currently admitted connections.
    pub connections_active: u64,
    /// Failed or timed-out handshakes.
    pub handshakes_rejected: u64,
    /// Events accepted by `publish`.
    pub events_published: u64,
    /// Per-connection deliveries.
    pub events_delivered: u64,
    /// Non-critical events shed under backpressure.
    pub events_dropped: u64,
    /// Sequenced events dropped as duplicate or late.
    pub stale_events: u64,
    /// Connections closed as slow consumers.
    pub slow_consumer_closes: u64,
    /// Connections closed so their client resynchronizes a chat.
    pub resync_closes: u64,
    /// Connections evicted on session revocation.
    pub evictions: u64,
    /// Chats currently holding a reorder gate.
    pub reorder_gates: u64,
}
