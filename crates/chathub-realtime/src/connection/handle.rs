//! Handle to one admitted connection.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chathub_core::context::TenantContext;
use chathub_core::result::AppResult;
use chathub_core::types::ConnectionId;

use crate::message::ServerMessage;

use super::close::CloseReason;
use super::queue::{OutboundItem, OutboundQueue, PushOutcome};

/// A live, authenticated connection.
///
/// Shared between the registry (which owns its membership), the fan-out
/// workers (which enqueue onto it), and the driver (which drains it).
/// Closing is idempotent: the first reason recorded wins, the outbound
/// queue is closed, and both of the driver's loops are cancelled.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Connection ID.
    pub id: ConnectionId,
    /// Context the handshake token was validated into.
    pub ctx: TenantContext,
    /// Admission time.
    pub connected_at: DateTime<Utc>,
    queue: OutboundQueue,
    cancel: CancellationToken,
    close_reason: OnceLock<CloseReason>,
}

impl ConnectionHandle {
    /// Create a handle with an outbound queue of `queue_capacity`.
    pub fn new(ctx: TenantContext, queue_capacity: usize) -> Self {
        Self {
            id: ConnectionId::new(),
            ctx,
            connected_at: Utc::now(),
            queue: OutboundQueue::new(queue_capacity),
            cancel: CancellationToken::new(),
            close_reason: OnceLock::new(),
        }
    }

    /// Enqueue a serialized frame.
    ///
    /// A `SlowConsumer` failure closes the connection before returning.
    pub fn enqueue(&self, item: OutboundItem) -> AppResult<PushOutcome> {
        self.queue.push(item).inspect_err(|_| {
            self.close(CloseReason::SlowConsumer);
        })
    }

    /// Enqueue a control frame. Control frames are never shed.
    pub fn send_control(&self, message: &ServerMessage) -> AppResult<PushOutcome> {
        let text = serde_json::to_string(message)?;
        self.enqueue(OutboundItem::critical(text))
    }

    /// Next frame to write, or `None` once closed.
    pub async fn next_outbound(&self) -> Option<OutboundItem> {
        self.queue.pop().await
    }

    /// Close the connection. Returns `false` if it was already closed.
    pub fn close(&self, reason: CloseReason) -> bool {
        let first = self.close_reason.set(reason).is_ok();
        if first {
            debug!(conn_id = %self.id, reason = %reason, "Closing connection");
        }
        self.queue.close();
        self.cancel.cancel();
        first
    }

    /// Reason recorded by the first `close`.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the connection is closed.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Frames waiting to be written.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chathub_core::error::ErrorKind;
    use chathub_core::types::{SessionId, TenantId, UserId, UserRole};

    fn handle(capacity: usize) -> ConnectionHandle {
        ConnectionHandle::new(
            TenantContext {
                tenant_id: TenantId::new(),
                user_id: UserId::new(),
                role: UserRole::Agent,
                session_id: SessionId::new(),
            },
            capacity,
        )
    }

    #[test]
    fn test_first_close_reason_wins() {
        let handle = handle(4);
        assert!(handle.close(CloseReason::Revoked));
        assert!(!handle.close(CloseReason::Normal));
        assert_eq!(handle.close_reason(), Some(CloseReason::Revoked));
        assert!(handle.is_closed());
    }

    #[test]
    fn test_overflow_closes_as_slow_consumer() {
        let handle = handle(1);
        handle.enqueue(OutboundItem::critical("a")).unwrap();
        let err = handle.enqueue(OutboundItem::critical("b")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::SlowConsumer);
        assert_eq!(handle.close_reason(), Some(CloseReason::SlowConsumer));
    }

    #[tokio::test]
    async fn test_close_wakes_cancelled_waiters() {
        let handle = std::sync::Arc::new(handle(4));
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.cancelled().await })
        };
        handle.close(CloseReason::Normal);
        waiter.await.unwrap();
        assert_eq!(handle.next_outbound().await, None);
    }
}
