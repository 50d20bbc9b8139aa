//! WebSocket upgrade handler.
//!
//! Authentication happens inside the socket (first frame), so the upgrade
//! itself is unauthenticated. The handler only adapts axum frames to the
//! transport-neutral frames the connection driver speaks.

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::response::Response;
use futures::{SinkExt, StreamExt, future};

use chathub_realtime::WireFrame;

use crate::state::AppState;

/// GET /ws
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_socket(state, socket))
}

async fn serve_socket(state: AppState, socket: WebSocket) {
    let (sink, stream) = socket.split();

    let stream = Box::pin(stream.filter_map(|message| {
        future::ready(match message {
            Ok(message) => from_axum(message).map(Ok),
            Err(e) => Some(Err(e)),
        })
    }));
    let sink = sink.with(|frame: WireFrame| future::ok::<_, axum::Error>(to_axum(frame)));

    state.realtime.driver.run(stream, sink).await;
}

fn from_axum(message: Message) -> Option<WireFrame> {
    match message {
        Message::Text(text) => Some(WireFrame::Text(text.as_str().to_owned())),
        Message::Ping(data) => Some(WireFrame::Ping(data.to_vec())),
        Message::Pong(data) => Some(WireFrame::Pong(data.to_vec())),
        Message::Close(frame) => Some(WireFrame::Close(
            frame.map(|f| (f.code, f.reason.as_str().to_owned())),
        )),
        Message::Binary(_) => None,
    }
}

fn to_axum(frame: WireFrame) -> Message {
    match frame {
        WireFrame::Text(text) => Message::Text(text.into()),
        WireFrame::Ping(data) => Message::Ping(Bytes::from(data)),
        WireFrame::Pong(data) => Message::Pong(Bytes::from(data)),
        WireFrame::Close(frame) => Message::Close(frame.map(|(code, reason)| CloseFrame {
            code,
            reason: reason.into(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_frame_keeps_code() {
        let message = to_axum(WireFrame::Close(Some((4003, "revoked".to_string()))));
        match from_axum(message) {
            Some(WireFrame::Close(Some((code, reason)))) => {
                assert_eq!(code, 4003);
                assert_eq!(reason, "revoked");
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_binary_frames_are_ignored() {
        assert!(from_axum(Message::Binary(Bytes::from_static(b"\x00"))).is_none());
    }
}
