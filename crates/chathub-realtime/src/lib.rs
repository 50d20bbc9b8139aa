//! # chathub-realtime
//!
//! Real-time gateway for ChatHub. Provides:
//!
//! - A tenant-sharded connection registry run as single-writer actors
//! - Ordered per-chat event fan-out with bounded per-connection queues
//! - Presence tracking with debounced offline transitions
//! - A transport-agnostic connection driver (handshake, read/write loops,
//!   heartbeat)
//! - The reconnection state machine and a WebSocket gateway client

pub mod client;
pub mod connection;
pub mod fanout;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod reconnect;
pub mod server;

pub use client::{GatewayClient, GatewayConnection, TokenSource};
pub use connection::{CloseReason, ConnectionDriver, ConnectionHandle, ConnectionRegistry, WireFrame};
pub use fanout::FanoutEngine;
pub use metrics::{MetricsSnapshot, RealtimeMetrics};
pub use presence::PresenceTracker;
pub use reconnect::{ConnectionState, ReconnectAction, ReconnectMachine};
pub use server::RealtimeEngine;
