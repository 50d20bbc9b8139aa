//! Fan-out worker pool.
//!
//! Chat events are routed to a worker by chat ID and tenant-wide events by
//! tenant ID, so every event of one chat is handled by one worker, in the
//! order it was published. Each worker resolves the delivery set from the
//! registry and pushes the serialized envelope onto every target's
//! outbound queue; a slow connection never blocks the worker.
//!
//! A sequenced event that cannot be delivered in order (late, or lost
//! behind a gap that was given up on) closes the chat's joined connections
//! with `SlowConsumer`, so their clients reconcile over REST instead of
//! silently missing a message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, error, warn};

use chathub_core::config::RealtimeConfig;
use chathub_core::error::AppError;
use chathub_core::events::DomainEvent;
use chathub_core::result::AppResult;
use chathub_core::types::{ChatId, TenantId};

use crate::connection::{CloseReason, ConnectionRegistry, OutboundItem, PushOutcome};
use crate::message::EventEnvelope;
use crate::metrics::RealtimeMetrics;

use super::gate::{GateOutcome, ReorderGate, Skip};

#[derive(Debug)]
enum Dispatch {
    Event(DomainEvent),
    Flush(oneshot::Sender<()>),
}

/// Publishes domain events to live connections.
#[derive(Debug)]
pub struct FanoutEngine {
    workers: Vec<mpsc::Sender<Dispatch>>,
    metrics: Arc<RealtimeMetrics>,
}

impl FanoutEngine {
    /// Spawn the configured number of workers.
    pub fn new(
        config: &RealtimeConfig,
        registry: Arc<ConnectionRegistry>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        let workers = (0..config.fanout_workers.max(1))
            .map(|index| {
                let (tx, rx) = mpsc::channel(config.fanout_queue_capacity.max(1));
                let worker = Worker {
                    index,
                    registry: Arc::clone(&registry),
                    metrics: Arc::clone(&metrics),
                    gates: HashMap::new(),
                    window: config.reorder_window,
                    timeout: config.reorder_timeout(),
                    idle: config.reorder_idle(),
                };
                tokio::spawn(worker.run(rx));
                tx
            })
            .collect();
        Self { workers, metrics }
    }

    /// Queue `event` for delivery.
    ///
    /// Returns once the event is accepted by its worker, not once it has
    /// reached connections. Sequenced kinds must carry a sequence.
    pub async fn publish(&self, event: DomainEvent) -> AppResult<()> {
        event.validate()?;
        let index = match event.chat_id() {
            Some(chat_id) => chat_id.shard(self.workers.len()),
            None => event.tenant_id.shard(self.workers.len()),
        };
        self.workers[index]
            .send(Dispatch::Event(event))
            .await
            .map_err(|_| AppError::service_unavailable("Fan-out worker stopped"))?;
        self.metrics.event_published();
        Ok(())
    }

    /// Wait until every event published before this call has been
    /// processed. Events held behind a sequence gap stay held.
    pub async fn flush(&self) {
        for worker in &self.workers {
            let (tx, rx) = oneshot::channel();
            if worker.send(Dispatch::Flush(tx)).await.is_ok() {
                let _ = rx.await;
            }
        }
    }
}

struct Worker {
    index: usize,
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<RealtimeMetrics>,
    gates: HashMap<(TenantId, ChatId), ReorderGate<DomainEvent>>,
    window: usize,
    timeout: Duration,
    idle: Duration,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<Dispatch>) {
        debug!(worker = self.index, "Fan-out worker started");
        let mut sweep = interval_at(Instant::now() + self.idle, self.idle);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let deadline = self.gates.values().filter_map(ReorderGate::deadline).min();
            tokio::select! {
                dispatch = rx.recv() => match dispatch {
                    Some(Dispatch::Event(event)) => self.accept(event).await,
                    Some(Dispatch::Flush(done)) => {
                        let _ = done.send(());
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.expire(Instant::now()).await;
                }
                _ = sweep.tick() => self.drop_idle_gates(Instant::now()),
            }
        }
        debug!(worker = self.index, "Fan-out worker stopped");
    }

    async fn accept(&mut self, event: DomainEvent) {
        let (Some(sequence), Some(chat_id)) = (event.sequence, event.chat_id()) else {
            self.deliver(&event).await;
            return;
        };
        let tenant_id = event.tenant_id;

        let (window, timeout) = (self.window, self.timeout);
        let metrics = &self.metrics;
        let gate = self.gates.entry((tenant_id, chat_id)).or_insert_with(|| {
            metrics.gate_opened();
            ReorderGate::new(window, timeout)
        });

        match gate.offer(sequence, event, Instant::now()) {
            GateOutcome::Ready(events) => {
                for event in &events {
                    self.deliver(event).await;
                }
            }
            GateOutcome::Held => {
                debug!(chat_id = %chat_id, sequence, "Holding event behind sequence gap");
            }
            GateOutcome::Duplicate(event) => {
                self.metrics.stale_event();
                debug!(
                    chat_id = %chat_id,
                    sequence,
                    event_id = %event.id,
                    "Dropping already delivered sequenced event"
                );
            }
            GateOutcome::Late(event) => {
                self.metrics.stale_event();
                warn!(
                    chat_id = %chat_id,
                    sequence,
                    event_id = %event.id,
                    "Sequenced event arrived after later ones were delivered"
                );
                self.resync(tenant_id, chat_id).await;
            }
            GateOutcome::Skipped(skip) => self.release_skipped(tenant_id, chat_id, skip).await,
        }
    }

    async fn expire(&mut self, now: Instant) {
        let skipped: Vec<_> = self
            .gates
            .iter_mut()
            .filter_map(|(&(tenant_id, chat_id), gate)| {
                gate.expire(now).map(|skip| (tenant_id, chat_id, skip))
            })
            .collect();
        for (tenant_id, chat_id, skip) in skipped {
            self.release_skipped(tenant_id, chat_id, skip).await;
        }
    }

    async fn release_skipped(&self, tenant_id: TenantId, chat_id: ChatId, skip: Skip<DomainEvent>) {
        warn!(
            chat_id = %chat_id,
            missing = skip.missing,
            released = skip.ready.len(),
            "Gave up on sequence gap"
        );
        self.resync(tenant_id, chat_id).await;
        for event in &skip.ready {
            self.deliver(event).await;
        }
    }

    fn drop_idle_gates(&mut self, now: Instant) {
        let idle = self.idle;
        let before = self.gates.len();
        self.gates.retain(|_, gate| !gate.is_idle(now, idle));
        let dropped = before - self.gates.len();
        if dropped > 0 {
            self.metrics.gates_dropped(dropped);
            debug!(worker = self.index, dropped, "Dropped idle reorder gates");
        }
    }

    /// Close every connection joined to the chat so its client refetches.
    async fn resync(&self, tenant_id: TenantId, chat_id: ChatId) {
        let targets = match self.registry.chat_targets(tenant_id, chat_id).await {
            Ok(targets) => targets,
            Err(e) => {
                error!(chat_id = %chat_id, error = %e, "Failed to resolve resync set");
                return;
            }
        };
        let mut closed = 0;
        for handle in &targets {
            if handle.close(CloseReason::SlowConsumer) {
                closed += 1;
            }
        }
        if closed > 0 {
            self.metrics.resync_closed(closed);
            warn!(chat_id = %chat_id, closed, "Closed connections for resync");
        }
    }

    async fn deliver(&self, event: &DomainEvent) {
        let text: Arc<str> = match serde_json::to_string(&EventEnvelope::from_event(event)) {
            Ok(text) => text.into(),
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Failed to serialize event");
                return;
            }
        };

        let targets = match event.chat_id() {
            Some(chat_id) => self.registry.chat_targets(event.tenant_id, chat_id).await,
            None => self.registry.tenant_targets(event.tenant_id).await,
        };
        let targets = match targets {
            Ok(targets) => targets,
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Failed to resolve delivery set");
                return;
            }
        };

        let critical = event.is_critical();
        for handle in targets.iter().filter(|h| h.ctx.tenant_id == event.tenant_id) {
            let item = OutboundItem {
                text: Arc::clone(&text),
                critical,
            };
            match handle.enqueue(item) {
                Ok(PushOutcome::Queued) => self.metrics.event_delivered(),
                Ok(PushOutcome::DroppedOldest) => {
                    self.metrics.event_delivered();
                    self.metrics.event_dropped();
                }
                Ok(PushOutcome::DroppedIncoming) => self.metrics.event_dropped(),
                Ok(PushOutcome::Closed) => {}
                Err(_) => {
                    self.metrics.slow_consumer_closed();
                    warn!(
                        conn_id = %handle.id,
                        user_id = %handle.ctx.user_id,
                        "Outbound queue saturated, closing slow consumer"
                    );
                }
            }
        }
    }
}
