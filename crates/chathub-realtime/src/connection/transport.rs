//! Transport-neutral frames.
//!
//! The driver speaks `WireFrame`; the HTTP layer adapts axum's WebSocket
//! messages to and from it, and tests drive it over plain channels.

/// One WebSocket-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// UTF-8 text (all protocol messages).
    Text(String),
    /// Keepalive probe.
    Ping(Vec<u8>),
    /// Keepalive answer.
    Pong(Vec<u8>),
    /// Close with optional code and reason.
    Close(Option<(u16, String)>),
}

impl WireFrame {
    /// Close frame for `reason`.
    pub fn close(reason: super::CloseReason) -> Self {
        Self::Close(Some((reason.code(), reason.as_str().to_string())))
    }
}
