//! Per-connection driver: handshake, then concurrent write and read loops.
//!
//! The driver is transport-neutral. It consumes a stream of inbound
//! [`WireFrame`]s and writes outbound frames to a sink; the HTTP layer
//! adapts a WebSocket to that shape and tests use in-memory channels.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, error, info, warn};

use chathub_auth::SessionManager;
use chathub_core::config::RealtimeConfig;
use chathub_core::error::AppError;
use chathub_core::events::{DomainEvent, EventPayload, ReadReceipt, Typing};
use chathub_core::result::AppResult;
use chathub_core::traits::{ChatDirectory, EventLog};
use chathub_core::types::{ChatId, MessageId};

use crate::fanout::FanoutEngine;
use crate::message::{ClientMessage, Handshake, ServerMessage};
use crate::metrics::RealtimeMetrics;
use crate::presence::PresenceTracker;

use super::close::CloseReason;
use super::handle::ConnectionHandle;
use super::registry::ConnectionRegistry;
use super::transport::WireFrame;

/// Runs connections from first frame to final close.
pub struct ConnectionDriver {
    sessions: Arc<SessionManager>,
    registry: Arc<ConnectionRegistry>,
    fanout: Arc<FanoutEngine>,
    presence: Arc<PresenceTracker>,
    chats: Arc<dyn ChatDirectory>,
    events: Arc<dyn EventLog>,
    metrics: Arc<RealtimeMetrics>,
    handshake_timeout: Duration,
    ping_interval: Duration,
    ping_timeout: Duration,
    queue_capacity: usize,
}

impl std::fmt::Debug for ConnectionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDriver")
            .field("handshake_timeout", &self.handshake_timeout)
            .field("ping_interval", &self.ping_interval)
            .field("ping_timeout", &self.ping_timeout)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl ConnectionDriver {
    /// Create a driver over the gateway's shared components.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &RealtimeConfig,
        sessions: Arc<SessionManager>,
        registry: Arc<ConnectionRegistry>,
        fanout: Arc<FanoutEngine>,
        presence: Arc<PresenceTracker>,
        chats: Arc<dyn ChatDirectory>,
        events: Arc<dyn EventLog>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            sessions,
            registry,
            fanout,
            presence,
            chats,
            events,
            metrics,
            handshake_timeout: config.handshake_timeout(),
            ping_interval: Duration::from_secs(config.ping_interval_seconds.max(1)),
            ping_timeout: Duration::from_secs(config.ping_timeout_seconds.max(1)),
            queue_capacity: config.outbound_queue_capacity,
        }
    }

    /// Drive one connection until it closes.
    ///
    /// The first text frame must be a handshake carrying an access token;
    /// nothing else is processed before it is validated. On return the
    /// connection is released from the registry.
    pub async fn run<S, E, K>(&self, mut stream: S, mut sink: K)
    where
        S: Stream<Item = Result<WireFrame, E>> + Unpin + Send,
        E: Display,
        K: Sink<WireFrame> + Unpin + Send,
        K::Error: Display,
    {
        let token = match timeout(self.handshake_timeout, read_handshake(&mut stream)).await {
            Ok(Ok(Some(token))) => token,
            Ok(Ok(None)) => {
                debug!("Client left before handshake");
                return;
            }
            Ok(Err(e)) => {
                self.reject(&mut sink, &e).await;
                return;
            }
            Err(_) => {
                self.metrics.handshake_rejected();
                warn!(timeout = ?self.handshake_timeout, "Handshake timed out");
                send_close(&mut sink, CloseReason::HandshakeTimeout).await;
                return;
            }
        };

        // Validate before touching the registry.
        let ctx = match self.sessions.validate_access(&token).await {
            Ok(ctx) => ctx,
            Err(e) => {
                self.reject(&mut sink, &e).await;
                return;
            }
        };

        let handle = Arc::new(ConnectionHandle::new(ctx, self.queue_capacity));
        if let Err(e) = self.registry.admit(Arc::clone(&handle)).await {
            error!(error = %e, "Failed to admit connection");
            send_close(&mut sink, CloseReason::InternalError).await;
            return;
        }

        // A revocation that landed between validation and admission found
        // nothing to evict; check the store again now that the connection
        // is visible.
        if let Err(e) = self.sessions.confirm_active(&ctx).await {
            handle.close(CloseReason::for_error(&e));
            let _ = self.registry.remove(&handle).await;
            self.reject(&mut sink, &e).await;
            return;
        }

        self.metrics.connection_opened();
        let _ = handle.send_control(&ServerMessage::Authenticated {
            connection_id: handle.id,
            tenant_id: ctx.tenant_id,
            user_id: ctx.user_id,
            session_id: ctx.session_id,
        });

        tokio::join!(
            self.write_loop(&handle, &mut sink),
            self.read_loop(&handle, &mut stream),
        );

        if let Err(e) = self.registry.remove(&handle).await {
            warn!(conn_id = %handle.id, error = %e, "Failed to release connection");
        }
        self.metrics.connection_closed();
        info!(
            conn_id = %handle.id,
            user_id = %ctx.user_id,
            reason = %handle.close_reason().unwrap_or(CloseReason::Normal),
            "Connection closed"
        );
    }

    async fn reject<K>(&self, sink: &mut K, err: &AppError)
    where
        K: Sink<WireFrame> + Unpin,
    {
        self.metrics.handshake_rejected();
        warn!(code = err.kind.code(), error = %err.message, "Handshake rejected");
        if let Ok(text) = serde_json::to_string(&ServerMessage::unauthorized(err)) {
            let _ = sink.send(WireFrame::Text(text)).await;
        }
        send_close(sink, CloseReason::for_error(err)).await;
    }

    async fn write_loop<K>(&self, handle: &ConnectionHandle, sink: &mut K)
    where
        K: Sink<WireFrame> + Unpin,
        K::Error: Display,
    {
        let mut ping = interval_at(Instant::now() + self.ping_interval, self.ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let frame = tokio::select! {
                biased;
                _ = handle.cancelled() => break,
                item = handle.next_outbound() => match item {
                    Some(item) => WireFrame::Text(item.text.to_string()),
                    None => break,
                },
                _ = ping.tick() => WireFrame::Ping(Vec::new()),
            };
            if let Err(e) = sink.send(frame).await {
                debug!(conn_id = %handle.id, error = %e, "Write failed");
                handle.close(CloseReason::Normal);
                return;
            }
        }

        let reason = handle.close_reason().unwrap_or(CloseReason::Normal);
        send_close(sink, reason).await;
    }

    async fn read_loop<S, E>(&self, handle: &ConnectionHandle, stream: &mut S)
    where
        S: Stream<Item = Result<WireFrame, E>> + Unpin,
        E: Display,
    {
        loop {
            let frame = tokio::select! {
                biased;
                _ = handle.cancelled() => break,
                frame = timeout(self.ping_timeout, stream.next()) => frame,
            };
            match frame {
                Ok(Some(Ok(WireFrame::Text(text)))) => self.on_text(handle, &text).await,
                Ok(Some(Ok(WireFrame::Ping(_) | WireFrame::Pong(_)))) => {}
                Ok(Some(Ok(WireFrame::Close(_))) | None) => {
                    handle.close(CloseReason::Normal);
                    break;
                }
                Ok(Some(Err(e))) => {
                    debug!(conn_id = %handle.id, error = %e, "Read failed");
                    handle.close(CloseReason::Normal);
                    break;
                }
                Err(_) => {
                    warn!(conn_id = %handle.id, "No client traffic within heartbeat timeout");
                    handle.close(CloseReason::HeartbeatTimeout);
                    break;
                }
            }
        }
    }

    async fn on_text(&self, handle: &ConnectionHandle, text: &str) {
        let message: ClientMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                reply(handle, &ServerMessage::error(&AppError::validation(format!(
                    "Invalid message: {e}"
                ))));
                return;
            }
        };

        let result = match message {
            ClientMessage::JoinChat { chat_id } => self
                .join(handle, chat_id)
                .await
                .map(|_| Some(ServerMessage::Joined { chat_id })),
            ClientMessage::LeaveChat { chat_id } => self
                .registry
                .leave(handle, chat_id)
                .await
                .map(|_| Some(ServerMessage::Left { chat_id })),
            ClientMessage::TypingStart { chat_id } => {
                self.typing(handle, chat_id, true).await.map(|_| None)
            }
            ClientMessage::TypingStop { chat_id } => {
                self.typing(handle, chat_id, false).await.map(|_| None)
            }
            ClientMessage::MarkRead {
                chat_id,
                message_ids,
            } => self.mark_read(handle, chat_id, message_ids).await.map(|_| None),
            ClientMessage::UpdatePresence { status } => self
                .presence
                .set_status(&handle.ctx, status)
                .await
                .map(|_| None),
        };

        match result {
            Ok(Some(message)) => reply(handle, &message),
            Ok(None) => {}
            Err(e) => {
                debug!(conn_id = %handle.id, code = e.kind.code(), error = %e.message, "Request failed");
                reply(handle, &ServerMessage::error(&e));
            }
        }
    }

    /// Entitlement is re-checked on every join.
    async fn join(&self, handle: &ConnectionHandle, chat_id: ChatId) -> AppResult<bool> {
        let chat = self.chats.authorize(&handle.ctx, chat_id).await?;
        self.registry.join(handle, &chat).await
    }

    async fn typing(&self, handle: &ConnectionHandle, chat_id: ChatId, started: bool) -> AppResult<()> {
        if !self.registry.is_joined(handle, chat_id).await? {
            return Err(AppError::forbidden(format!("Not joined to chat {chat_id}")));
        }
        let typing = Typing {
            chat_id,
            user_id: handle.ctx.user_id,
        };
        let payload = if started {
            EventPayload::TypingStart(typing)
        } else {
            EventPayload::TypingStop(typing)
        };
        self.fanout
            .publish(DomainEvent::new(handle.ctx.tenant_id, payload))
            .await
    }

    async fn mark_read(
        &self,
        handle: &ConnectionHandle,
        chat_id: ChatId,
        message_ids: Vec<MessageId>,
    ) -> AppResult<()> {
        if message_ids.is_empty() {
            return Err(AppError::validation("message_ids must not be empty"));
        }
        let ctx = &handle.ctx;
        self.chats.authorize(ctx, chat_id).await?;
        let sequence = self.events.append(ctx.tenant_id, chat_id).await?;
        let event = DomainEvent::sequenced(
            ctx.tenant_id,
            sequence,
            EventPayload::Read(ReadReceipt {
                chat_id,
                user_id: ctx.user_id,
                message_ids,
            }),
        );
        self.fanout.publish(event).await
    }
}

fn reply(handle: &ConnectionHandle, message: &ServerMessage) {
    if let Err(e) = handle.send_control(message) {
        debug!(conn_id = %handle.id, error = %e, "Reply not queued");
    }
}

async fn read_handshake<S, E>(stream: &mut S) -> AppResult<Option<String>>
where
    S: Stream<Item = Result<WireFrame, E>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WireFrame::Text(text)) => {
                let handshake: Handshake = serde_json::from_str(&text)
                    .map_err(|_| AppError::unauthenticated("Malformed handshake"))?;
                if handshake.token.is_empty() {
                    return Err(AppError::unauthenticated("Missing access token"));
                }
                return Ok(Some(handshake.token));
            }
            Ok(WireFrame::Ping(_) | WireFrame::Pong(_)) => {}
            Ok(WireFrame::Close(_)) | Err(_) => return Ok(None),
        }
    }
    Ok(None)
}

async fn send_close<K>(sink: &mut K, reason: CloseReason)
where
    K: Sink<WireFrame> + Unpin,
{
    let _ = sink.send(WireFrame::close(reason)).await;
    let _ = sink.close().await;
}
