//! Reconnecting gateway client.
//!
//! Speaks the same protocol as the gateway over `tokio-tungstenite`: every
//! (re)connection opens a new socket and sends a fresh handshake, an
//! `Expired` rejection triggers a token refresh before the next attempt,
//! and `Unauthenticated`/`Revoked`/`Replaced` or running out of attempts
//! end the loop.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use chathub_core::config::ReconnectConfig;
use chathub_core::error::{AppError, ErrorKind};
use chathub_core::result::AppResult;
use chathub_core::types::{ConnectionId, SessionId, TenantId, UserId};

use crate::connection::CloseReason;
use crate::message::{ClientMessage, Handshake, ServerFrame, ServerMessage};
use crate::reconnect::{Clock, ConnectionState, FailReason, ReconnectAction, ReconnectMachine};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Supplies access tokens to the client.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Current access token.
    async fn access_token(&self) -> AppResult<String>;

    /// Exchange the refresh token for a new pair and return the new access
    /// token.
    async fn refresh(&self) -> AppResult<String>;
}

/// An authenticated gateway connection.
pub struct GatewayConnection {
    socket: Socket,
    /// Server-assigned connection ID.
    pub connection_id: ConnectionId,
    /// Tenant of the session.
    pub tenant_id: TenantId,
    /// User of the session.
    pub user_id: UserId,
    /// Session the token belongs to.
    pub session_id: SessionId,
    close_code: Option<u16>,
}

impl std::fmt::Debug for GatewayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConnection")
            .field("connection_id", &self.connection_id)
            .field("session_id", &self.session_id)
            .field("close_code", &self.close_code)
            .finish()
    }
}

impl GatewayConnection {
    /// Send a client message.
    pub async fn send(&mut self, message: &ClientMessage) -> AppResult<()> {
        let text = serde_json::to_string(message)?;
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| AppError::service_unavailable(format!("Gateway send failed: {e}")))
    }

    /// Next server frame. `None` once the connection has closed; see
    /// [`Self::close_code`] for why.
    pub async fn next_frame(&mut self) -> Option<AppResult<ServerFrame>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(text.as_str()).map_err(AppError::from));
                }
                Ok(Message::Close(frame)) => {
                    self.close_code = frame.map(|f| u16::from(f.code));
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Gateway read failed");
                    return None;
                }
            }
        }
    }

    /// Close code received from the server, if any.
    pub fn close_code(&self) -> Option<u16> {
        self.close_code
    }

    /// Close from the client side.
    pub async fn close(mut self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client closing".into(),
        };
        let _ = self.socket.close(Some(frame)).await;
    }
}

/// Client that connects and reconnects according to the backoff schedule.
pub struct GatewayClient {
    url: String,
    tokens: Arc<dyn TokenSource>,
    machine: ReconnectMachine,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("url", &self.url)
            .field("machine", &self.machine)
            .finish()
    }
}

impl GatewayClient {
    /// Create a client for `url` (e.g. `ws://host:8080/ws`).
    pub fn new(url: impl Into<String>, tokens: Arc<dyn TokenSource>, config: &ReconnectConfig) -> Self {
        Self {
            url: url.into(),
            tokens,
            machine: ReconnectMachine::new(config),
        }
    }

    /// Create a client whose backoff runs on `clock`.
    pub fn with_clock(
        url: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
        config: &ReconnectConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            url: url.into(),
            tokens,
            machine: ReconnectMachine::with_clock(config, clock),
        }
    }

    /// Protocol state.
    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Connect for the first time.
    pub async fn connect(&mut self) -> AppResult<GatewayConnection> {
        let action = self.machine.start();
        self.drive(action).await
    }

    /// Reconnect after `previous` closed.
    pub async fn reconnect(&mut self, previous: &GatewayConnection) -> AppResult<GatewayConnection> {
        let action = self.machine.on_closed(previous.close_code());
        self.drive(action).await
    }

    /// Stop reconnecting.
    pub fn disconnect(&mut self) {
        self.machine.disconnect();
    }

    async fn drive(&mut self, mut action: ReconnectAction) -> AppResult<GatewayConnection> {
        loop {
            let token = match action {
                ReconnectAction::Connect => self.tokens.access_token().await,
                ReconnectAction::RefreshThenConnect => self.tokens.refresh().await,
                ReconnectAction::Wait(delay) => {
                    debug!(delay = ?delay, attempt = self.machine.attempt(), "Waiting to reconnect");
                    tokio::time::sleep(delay).await;
                    action = self.machine.poll();
                    continue;
                }
                ReconnectAction::Idle => {
                    return Err(AppError::service_unavailable("Gateway client is disconnected"));
                }
                ReconnectAction::Fail(reason) => return Err(fail_error(reason)),
            };

            let attempt = match token {
                Ok(token) => self.connect_once(&token).await,
                Err(e) => Err(e),
            };
            match attempt {
                Ok(connection) => {
                    self.machine.on_connected();
                    info!(conn_id = %connection.connection_id, "Gateway connected");
                    return Ok(connection);
                }
                Err(e) => {
                    warn!(code = e.kind.code(), error = %e.message, "Gateway connection attempt failed");
                    action = self.machine.on_closed(Some(CloseReason::for_error(&e).code()));
                }
            }
        }
    }

    /// Open a socket and complete the handshake with `token`.
    pub async fn connect_once(&self, token: &str) -> AppResult<GatewayConnection> {
        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| AppError::service_unavailable(format!("Gateway connect failed: {e}")))?;

        let handshake = serde_json::to_string(&Handshake {
            token: token.to_string(),
        })?;
        socket
            .send(Message::Text(handshake.into()))
            .await
            .map_err(|e| AppError::service_unavailable(format!("Handshake send failed: {e}")))?;

        while let Some(message) = socket.next().await {
            let message = message
                .map_err(|e| AppError::service_unavailable(format!("Handshake read failed: {e}")))?;
            match message {
                Message::Text(text) => match serde_json::from_str::<ServerMessage>(text.as_str())? {
                    ServerMessage::Authenticated {
                        connection_id,
                        tenant_id,
                        user_id,
                        session_id,
                    } => {
                        return Ok(GatewayConnection {
                            socket,
                            connection_id,
                            tenant_id,
                            user_id,
                            session_id,
                            close_code: None,
                        });
                    }
                    ServerMessage::Unauthorized { code, message } => {
                        let kind = ErrorKind::from_code(&code).unwrap_or(ErrorKind::Unauthenticated);
                        return Err(AppError::new(kind, message));
                    }
                    other => debug!(frame = ?other, "Ignoring frame before handshake reply"),
                },
                Message::Close(frame) => {
                    let reason = frame
                        .and_then(|f| CloseReason::from_code(u16::from(f.code)))
                        .unwrap_or(CloseReason::Normal);
                    return Err(close_error(reason));
                }
                _ => {}
            }
        }
        Err(AppError::service_unavailable("Gateway closed during handshake"))
    }
}

fn close_error(reason: CloseReason) -> AppError {
    match reason {
        CloseReason::Expired => AppError::expired("Access token expired"),
        CloseReason::Revoked => AppError::revoked("Session revoked"),
        CloseReason::Unauthenticated => AppError::unauthenticated("Handshake rejected"),
        other => AppError::service_unavailable(format!("Gateway closed: {other}")),
    }
}

fn fail_error(reason: FailReason) -> AppError {
    match reason {
        FailReason::Terminal(CloseReason::Revoked) => {
            AppError::revoked("Session revoked; log in again")
        }
        FailReason::Terminal(CloseReason::Replaced) => {
            AppError::conflict("Displaced by a newer connection of the same user")
        }
        FailReason::Terminal(reason) => {
            AppError::unauthenticated(format!("Gateway refused credentials: {reason}"))
        }
        FailReason::AttemptsExhausted(attempts) => AppError::service_unavailable(format!(
            "Gateway unreachable after {attempts} reconnect attempts"
        )),
    }
}
