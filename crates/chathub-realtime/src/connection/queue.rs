//! Bounded per-connection outbound queue.
//!
//! Publishers never wait on a slow client. When the queue is full the
//! oldest non-critical item is shed to make room; if every queued item is
//! critical, a critical push fails with `SlowConsumer` and the queue closes,
//! so the client reconnects and reconciles instead of silently missing
//! messages.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use chathub_core::error::AppError;
use chathub_core::result::AppResult;

/// A serialized frame waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundItem {
    /// JSON text, shared across every target of one event.
    pub text: Arc<str>,
    /// Whether the item may be shed under backpressure.
    pub critical: bool,
}

impl OutboundItem {
    /// Critical item.
    pub fn critical(text: impl Into<Arc<str>>) -> Self {
        Self {
            text: text.into(),
            critical: true,
        }
    }

    /// Sheddable item.
    pub fn droppable(text: impl Into<Arc<str>>) -> Self {
        Self {
            text: text.into(),
            critical: false,
        }
    }
}

/// Result of a push that did not overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended.
    Queued,
    /// Appended after shedding the oldest non-critical item.
    DroppedOldest,
    /// The incoming non-critical item was discarded; the queue holds only
    /// critical items.
    DroppedIncoming,
    /// The queue is closed.
    Closed,
}

#[derive(Debug, Default)]
struct State {
    items: VecDeque<OutboundItem>,
    closed: bool,
}

/// Single-consumer bounded queue.
#[derive(Debug)]
pub struct OutboundQueue {
    state: Mutex<State>,
    notify: Notify,
    capacity: usize,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue without blocking.
    pub fn push(&self, item: OutboundItem) -> AppResult<PushOutcome> {
        let mut state = self.lock();
        if state.closed {
            return Ok(PushOutcome::Closed);
        }

        let outcome = if state.items.len() < self.capacity {
            PushOutcome::Queued
        } else if let Some(pos) = state.items.iter().position(|i| !i.critical) {
            state.items.remove(pos);
            PushOutcome::DroppedOldest
        } else if !item.critical {
            return Ok(PushOutcome::DroppedIncoming);
        } else {
            state.closed = true;
            state.items.clear();
            drop(state);
            self.notify.notify_one();
            return Err(AppError::slow_consumer(format!(
                "Outbound queue saturated with {} critical events",
                self.capacity
            )));
        };

        state.items.push_back(item);
        drop(state);
        self.notify.notify_one();
        Ok(outcome)
    }

    /// Wait for the next item. Returns `None` once closed.
    pub async fn pop(&self) -> Option<OutboundItem> {
        loop {
            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
            }
            self.notify.notified().await;
        }
    }

    /// Close the queue and discard its backlog.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.items.clear();
        drop(state);
        self.notify.notify_one();
    }

    /// Items waiting.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Critical items waiting.
    pub fn critical_len(&self) -> usize {
        self.lock().items.iter().filter(|i| i.critical).count()
    }

    /// Whether the queue was closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
